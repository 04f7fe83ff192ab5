use serde::{Deserialize, Serialize};

use crate::felt::{selector_from_name, Felt};

/// Generic validation entrypoint on the account that every module prefix call targets.
pub const MODULE_VALIDATE_ENTRYPOINT: &str = "__module_validate__";

/// Permission for a session key to invoke `selector` on `target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub target: Felt,
    pub selector: Felt,
}

impl Policy {
    pub fn new(target: Felt, selector: Felt) -> Self {
        Self { target, selector }
    }

    /// Policy for a human-readable entrypoint name on `target`.
    pub fn from_entrypoint(target: Felt, entrypoint: &str) -> Self {
        Self::new(target, selector_from_name(entrypoint))
    }
}

/// A single contract invocation in a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Felt,
    pub selector: Felt,
    #[serde(default)]
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn new(target: Felt, selector: Felt, calldata: Vec<Felt>) -> Self {
        Self { target, selector, calldata }
    }

    pub fn from_entrypoint(target: Felt, entrypoint: &str, calldata: Vec<Felt>) -> Self {
        Self::new(target, selector_from_name(entrypoint), calldata)
    }

    /// The `(target, selector)` pair this call needs permission for.
    pub fn policy(&self) -> Policy {
        Policy::new(self.target, self.selector)
    }
}

/// Synthetic call a module places in front of the user's batch.
///
/// It carries the evidence (validator class, signature, proofs) the account's validation
/// entrypoint checks before the real calls run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrefixCall {
    pub entrypoint: &'static str,
    pub target: Felt,
    pub calldata: Vec<Felt>,
}

impl PrefixCall {
    /// Prefix call against the account's module validation entrypoint.
    pub fn new(account: Felt, calldata: Vec<Felt>) -> Self {
        Self {
            entrypoint: MODULE_VALIDATE_ENTRYPOINT,
            target: account,
            calldata,
        }
    }

    pub fn selector(&self) -> Felt {
        selector_from_name(self.entrypoint)
    }

    pub fn into_call(self) -> Call {
        let selector = self.selector();
        Call::new(self.target, selector, self.calldata)
    }
}
