//! Shared types for modular account authorization: field elements, calls, policies.

pub mod call;
pub mod felt;

pub use call::{Call, Policy, PrefixCall, MODULE_VALIDATE_ENTRYPOINT};
pub use felt::{selector_from_name, starknet_keccak, Felt, FeltError, FIELD_PRIME};
