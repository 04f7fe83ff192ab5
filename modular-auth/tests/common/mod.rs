use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use modular_auth::{
    Call, ChainClient, ChainError, CompiledArtifact, Felt, IdentityDeriver, Receipt, TransactionStatus,
};
use tokio::sync::Mutex;

pub const ARTIFACT: &str = r#"{
    "compiler_version": "2.6.0",
    "bytecode": ["0xa0680017fff8000", "0x7", "0x482680017ffa8000", "0x1104800180018000"],
    "entry_points_by_type": {
        "EXTERNAL": [
            {"selector": "0x15d40a3d6ca2ac30f4031e42be28da9b056fef9bb7357ac5e85627ee876e5ad", "offset": 0, "builtins": ["range_check"]},
            {"selector": "0x162da33a4585851fe8d3af3c2a9c60b557814e221e0d4f30ff0b2189d9c7775", "offset": 56, "builtins": ["range_check", "ec_op"]}
        ],
        "L1_HANDLER": [],
        "CONSTRUCTOR": [
            {"selector": "0x28ffe4ff0f226a9107253e17a904099aa4f63a02a5621de0576e5aa71bc5194", "offset": 120, "builtins": []}
        ]
    }
}"#;

#[derive(Default)]
struct ChainState {
    declared: HashSet<Felt>,
    deployed: HashMap<Felt, Felt>,
    receipts: HashMap<Felt, Receipt>,
    executed: Vec<Vec<Call>>,
    next_tx: u64,
    revert_next: Option<String>,
}

impl ChainState {
    fn record(&mut self) -> Felt {
        self.next_tx += 1;
        let transaction_hash = Felt::from(0x7800u64 + self.next_tx);
        let receipt = match self.revert_next.take() {
            Some(reason) => Receipt {
                transaction_hash,
                status: TransactionStatus::Reverted,
                revert_reason: Some(reason),
            },
            None => Receipt {
                transaction_hash,
                status: TransactionStatus::Succeeded,
                revert_reason: None,
            },
        };
        self.receipts.insert(transaction_hash, receipt);
        transaction_hash
    }
}

/// In-memory node: declarations and deployments land immediately.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn occupy(&self, address: Felt, class_id: Felt) {
        self.state.lock().await.deployed.insert(address, class_id);
    }

    /// Make the next submitted transaction revert with `reason`.
    pub async fn revert_next(&self, reason: &str) {
        self.state.lock().await.revert_next = Some(reason.to_string());
    }

    pub async fn transaction_count(&self) -> u64 {
        self.state.lock().await.next_tx
    }

    pub async fn executed(&self) -> Vec<Vec<Call>> {
        self.state.lock().await.executed.clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn declare_class(&self, artifact: &CompiledArtifact) -> Result<Felt, ChainError> {
        let class_id = IdentityDeriver::new().class_identifier(artifact)?;
        let mut state = self.state.lock().await;
        let reverts = state.revert_next.is_some();
        let transaction_hash = state.record();
        if !reverts {
            state.declared.insert(class_id);
        }
        Ok(transaction_hash)
    }

    async fn deploy_contract(
        &self,
        class_id: Felt,
        salt: Felt,
        constructor_args: &[Felt],
    ) -> Result<Felt, ChainError> {
        let mut state = self.state.lock().await;
        if !state.declared.contains(&class_id) {
            return Err(ChainError::Rpc(format!("class {class_id} is not declared")));
        }
        let address = IdentityDeriver::new().deployed_address(class_id, salt, constructor_args);
        let reverts = state.revert_next.is_some();
        let transaction_hash = state.record();
        if !reverts {
            state.deployed.insert(address, class_id);
        }
        Ok(transaction_hash)
    }

    async fn execute(&self, calls: &[Call]) -> Result<Felt, ChainError> {
        let mut state = self.state.lock().await;
        state.executed.push(calls.to_vec());
        Ok(state.record())
    }

    async fn wait_for_transaction(&self, transaction_hash: Felt) -> Result<Receipt, ChainError> {
        self.state
            .lock()
            .await
            .receipts
            .get(&transaction_hash)
            .cloned()
            .ok_or_else(|| ChainError::Rpc(format!("unknown transaction {transaction_hash}")))
    }

    async fn get_class_hash_at(&self, address: Felt) -> Result<Option<Felt>, ChainError> {
        Ok(self.state.lock().await.deployed.get(&address).copied())
    }

    async fn is_class_declared(&self, class_id: Felt) -> Result<bool, ChainError> {
        Ok(self.state.lock().await.declared.contains(&class_id))
    }

    async fn call(&self, target: Felt, entrypoint: &str, _calldata: &[Felt]) -> Result<Vec<Felt>, ChainError> {
        let state = self.state.lock().await;
        match (state.deployed.get(&target), entrypoint) {
            (Some(class_id), "get_class_hash") => Ok(vec![*class_id]),
            (Some(_), _) => Ok(Vec::new()),
            (None, _) => Err(ChainError::Rpc(format!("no contract at {target}"))),
        }
    }
}
