//! Chain collaborator boundary and the idempotent workflows built on it.
//!
//! Nothing else in this crate talks to a node. The workflows here only compute identities
//! locally, compare them with chain state, and hand calls to a [`ChainClient`].

use async_trait::async_trait;
use modular_auth_types::{Call, Felt};
use thiserror::Error;

use crate::{
    error::AuthError,
    hash::PairHasher,
    identity::{CompiledArtifact, IdentityDeriver},
    module::Module,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Succeeded,
    Reverted,
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: Felt,
    pub status: TransactionStatus,
    /// Revert reason reported by the node, if any.
    pub revert_reason: Option<String>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Succeeded
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport or node error
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transaction {transaction_hash} reverted: {reason}")]
    Reverted { transaction_hash: Felt, reason: String },

    /// Deterministic address already holds a different class.
    #[error("address {address} is occupied by class {found}, expected {expected}")]
    AddressOccupied { address: Felt, found: Felt, expected: Felt },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Node access consumed by deployment and execution workflows.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a class declaration; returns the transaction hash.
    async fn declare_class(&self, artifact: &CompiledArtifact) -> Result<Felt, ChainError>;

    /// Submit a deployment; returns the transaction hash.
    async fn deploy_contract(
        &self,
        class_id: Felt,
        salt: Felt,
        constructor_args: &[Felt],
    ) -> Result<Felt, ChainError>;

    async fn execute(&self, calls: &[Call]) -> Result<Felt, ChainError>;

    async fn wait_for_transaction(&self, transaction_hash: Felt) -> Result<Receipt, ChainError>;

    /// Class deployed at `address`, or `None` when nothing is deployed there.
    async fn get_class_hash_at(&self, address: Felt) -> Result<Option<Felt>, ChainError>;

    async fn is_class_declared(&self, class_id: Felt) -> Result<bool, ChainError>;

    async fn call(&self, target: Felt, entrypoint: &str, calldata: &[Felt]) -> Result<Vec<Felt>, ChainError>;
}

/// Result of [`declare_if_needed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub class_id: Felt,
    /// `None` when the class was already declared.
    pub transaction_hash: Option<Felt>,
}

/// Result of [`deploy_if_needed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub class_id: Felt,
    pub address: Felt,
    /// `None` when the contract was already deployed.
    pub transaction_hash: Option<Felt>,
}

async fn confirm<C: ChainClient + ?Sized>(client: &C, transaction_hash: Felt) -> Result<Receipt, ChainError> {
    let receipt = client.wait_for_transaction(transaction_hash).await?;
    if receipt.is_success() {
        Ok(receipt)
    } else {
        Err(ChainError::Reverted {
            transaction_hash,
            reason: receipt.revert_reason.unwrap_or_default(),
        })
    }
}

/// Declare `artifact` unless its class identifier is already known to the chain.
pub async fn declare_if_needed<C, H>(
    client: &C,
    deriver: &IdentityDeriver<H>,
    artifact: &CompiledArtifact,
) -> Result<Declaration, ChainError>
where
    C: ChainClient + ?Sized,
    H: PairHasher,
{
    let class_id = deriver.class_identifier(artifact)?;
    if client.is_class_declared(class_id).await? {
        tracing::info!(%class_id, "class already declared");
        return Ok(Declaration {
            class_id,
            transaction_hash: None,
        });
    }

    let transaction_hash = client.declare_class(artifact).await?;
    confirm(client, transaction_hash).await?;
    tracing::info!(%class_id, %transaction_hash, "class declared");
    Ok(Declaration {
        class_id,
        transaction_hash: Some(transaction_hash),
    })
}

/// Deploy `class_id` at its deterministic address unless it is already there.
pub async fn deploy_if_needed<C, H>(
    client: &C,
    deriver: &IdentityDeriver<H>,
    class_id: Felt,
    salt: Felt,
    constructor_args: &[Felt],
) -> Result<Deployment, ChainError>
where
    C: ChainClient + ?Sized,
    H: PairHasher,
{
    let address = deriver.deployed_address(class_id, salt, constructor_args);
    match client.get_class_hash_at(address).await? {
        Some(found) if found == class_id => {
            tracing::info!(%address, %class_id, "contract already deployed");
            return Ok(Deployment {
                class_id,
                address,
                transaction_hash: None,
            });
        }
        Some(found) => {
            tracing::warn!(%address, %found, expected = %class_id, "deterministic address occupied");
            return Err(ChainError::AddressOccupied {
                address,
                found,
                expected: class_id,
            });
        }
        None => {}
    }

    let transaction_hash = client.deploy_contract(class_id, salt, constructor_args).await?;
    confirm(client, transaction_hash).await?;
    tracing::info!(%address, %class_id, %transaction_hash, "contract deployed");
    Ok(Deployment {
        class_id,
        address,
        transaction_hash: Some(transaction_hash),
    })
}

/// Prefix `calls` with the module's authorization call, submit, and wait for success.
pub async fn execute_with_module<C, M>(client: &C, module: &M, calls: Vec<Call>) -> Result<Receipt, ChainError>
where
    C: ChainClient + ?Sized,
    M: Module + ?Sized,
{
    let batch = module.with_prefix(calls)?;
    let transaction_hash = client.execute(&batch).await?;
    tracing::debug!(%transaction_hash, calls = batch.len(), "batch submitted");
    confirm(client, transaction_hash).await
}
