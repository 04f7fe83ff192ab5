//! Client-side authorization for modular smart accounts.
//!
//! - [`identity`]: class identifiers and deterministic deployment addresses
//! - [`merkle`]: policy trees scoping what a session key may call
//! - [`authorization`]: the session-key authorization request and its commitment
//! - [`module`]: validator modules that prefix a call batch with `__module_validate__`
//! - [`chain`]: the node boundary and idempotent declare/deploy/execute workflows

pub mod authorization;
pub mod chain;
pub mod error;
pub mod hash;
pub mod identity;
pub mod merkle;
pub mod module;
pub mod signer;


pub use authorization::{AuthorizationRequest, AuthorizationState, SessionParams};
pub use chain::{
    declare_if_needed, deploy_if_needed, execute_with_module, ChainClient, ChainError, Declaration,
    Deployment, Receipt, TransactionStatus,
};
pub use error::{AuthError, Result};
pub use hash::{hash_on_elements, HashChain, PairHasher, Pedersen, StarkKeccak};
pub use identity::{CompiledArtifact, EntryPoint, EntryPointsByType, IdentityDeriver};
pub use merkle::{node_hash, policy_leaf, verify_proof, PolicyMerkleTree};
pub use module::{BatchCoverage, Module, SessionKeyModule, SimpleValidatorModule, ValidatorKind};
pub use signer::{EthSigner, MessageSigner};

pub use modular_auth_types::{Call, Felt, Policy, PrefixCall};
