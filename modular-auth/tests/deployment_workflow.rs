mod common;

use std::sync::Arc;

use common::{MockChain, ARTIFACT};
use modular_auth::{
    declare_if_needed, deploy_if_needed, execute_with_module, AuthorizationRequest, Call, ChainClient,
    ChainError, CompiledArtifact, Felt, IdentityDeriver, Module, Policy, PolicyMerkleTree, SessionKeyModule,
    SessionParams, SimpleValidatorModule,
};

fn artifact() -> CompiledArtifact {
    CompiledArtifact::from_json(ARTIFACT).unwrap()
}

#[tokio::test]
async fn test_declare_is_idempotent() {
    let chain = MockChain::new();
    let deriver = IdentityDeriver::new();

    let first = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap();
    assert!(first.transaction_hash.is_some());
    assert_eq!(first.class_id, deriver.class_identifier(&artifact()).unwrap());
    assert!(chain.is_class_declared(first.class_id).await.unwrap());

    let second = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap();
    assert_eq!(second.class_id, first.class_id);
    assert_eq!(second.transaction_hash, None);
    assert_eq!(chain.transaction_count().await, 1);
}

#[tokio::test]
async fn test_deploy_lands_at_derived_address() {
    let chain = MockChain::new();
    let deriver = IdentityDeriver::new();
    let class_id = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap().class_id;
    let salt = Felt::from(0x5a17u64);
    let args = vec![Felt::from(0xbeefu64)];

    let deployment = deploy_if_needed(&chain, &deriver, class_id, salt, &args).await.unwrap();
    assert_eq!(deployment.address, deriver.deployed_address(class_id, salt, &args));
    assert!(deployment.transaction_hash.is_some());
    assert_eq!(chain.get_class_hash_at(deployment.address).await.unwrap(), Some(class_id));
    assert_eq!(
        chain.call(deployment.address, "get_class_hash", &[]).await.unwrap(),
        vec![class_id]
    );

    let again = deploy_if_needed(&chain, &deriver, class_id, salt, &args).await.unwrap();
    assert_eq!(again.address, deployment.address);
    assert_eq!(again.transaction_hash, None);
    assert_eq!(chain.transaction_count().await, 2);
}

#[tokio::test]
async fn test_deploy_refuses_occupied_address() {
    let chain = MockChain::new();
    let deriver = IdentityDeriver::new();
    let class_id = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap().class_id;
    let salt = Felt::ONE;
    let address = deriver.deployed_address(class_id, salt, &[]);
    chain.occupy(address, Felt::from(0xdeadu64)).await;

    let err = deploy_if_needed(&chain, &deriver, class_id, salt, &[]).await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::AddressOccupied { address: a, found, expected }
            if a == address && found == Felt::from(0xdeadu64) && expected == class_id
    ));
}

#[tokio::test]
async fn test_reverted_declaration_surfaces() {
    let chain = MockChain::new();
    let deriver = IdentityDeriver::new();
    chain.revert_next("out of gas").await;

    let err = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap_err();
    assert!(matches!(err, ChainError::Reverted { ref reason, .. } if reason == "out of gas"));

    // Nothing landed, so the retry declares for real.
    let retry = declare_if_needed(&chain, &deriver, &artifact()).await.unwrap();
    assert!(retry.transaction_hash.is_some());
}

#[tokio::test]
async fn test_malformed_artifact_stops_before_submission() {
    let chain = MockChain::new();
    let mut broken = artifact();
    broken.bytecode.clear();

    let err = declare_if_needed(&chain, &IdentityDeriver::new(), &broken).await.unwrap_err();
    assert!(matches!(err, ChainError::Auth(_)));
    assert_eq!(chain.transaction_count().await, 0);
}

#[tokio::test]
async fn test_session_key_batch_execution() {
    let chain = MockChain::new();
    let account = Felt::from(0xacc0u64);
    let token = Felt::from(0x70cu64);
    let policies = vec![
        Policy::from_entrypoint(token, "transfer"),
        Policy::from_entrypoint(token, "approve"),
        Policy::from_entrypoint(Felt::from(0xd3fu64), "swap"),
    ];
    let tree = Arc::new(PolicyMerkleTree::new(policies).unwrap());

    let request = AuthorizationRequest::new(SessionParams {
        account,
        validator_class: Felt::from(0x5e55u64),
        session_key: Felt::from(0x5e7u64),
        expiry: 1_900_000_000,
        policy_root: tree.root(),
        chain_id: Felt::short_string("SN_SEPOLIA"),
    });
    let mut module = SessionKeyModule::with_tree(request, tree).unwrap();
    module.request_signing_round(Felt::from(0x6a7u64)).unwrap();
    module.append_signature([Felt::from(1u64), Felt::from(2u64)]).unwrap();

    let calls = vec![Call::from_entrypoint(token, "transfer", vec![Felt::from(0xb0bu64), Felt::from(10u64)])];
    let receipt = execute_with_module(&chain, &module, calls.clone()).await.unwrap();
    assert!(receipt.is_success());

    let executed = chain.executed().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0][0], module.prefix(&calls).unwrap().into_call());
    assert_eq!(executed[0][0].target, account);
    assert_eq!(&executed[0][1..], calls.as_slice());

    // A call outside the policy set never reaches the chain.
    let rogue = vec![Call::from_entrypoint(token, "mint", vec![])];
    let err = execute_with_module(&chain, &module, rogue).await.unwrap_err();
    assert!(matches!(err, ChainError::Auth(_)));
    assert_eq!(chain.executed().await.len(), 1);
}

#[tokio::test]
async fn test_simple_validator_through_trait_object() {
    let chain = MockChain::new();
    let module: Box<dyn Module + Send + Sync> =
        Box::new(SimpleValidatorModule::stark(Felt::from(0xacc0u64), Felt::from(0x57au64)));
    let call = Call::from_entrypoint(Felt::from(0x70cu64), "transfer", vec![]);

    chain.revert_next("validation failed").await;
    let err = execute_with_module(&chain, module.as_ref(), vec![call]).await.unwrap_err();
    assert!(matches!(err, ChainError::Reverted { .. }));
}
