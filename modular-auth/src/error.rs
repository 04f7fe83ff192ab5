use modular_auth_types::Felt;
use thiserror::Error;

/// Errors raised by identity derivation and the authorization protocol.
///
/// Every failure leaves the object that raised it in its prior state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Compiled artifact could not be brought into canonical form for hashing.
    #[error("malformed artifact: {0}")]
    MalformedArtifact(String),

    /// Proof requested for a `(target, selector)` pair the tree does not contain.
    #[error("no policy for target {target} selector {selector}")]
    PolicyNotFound { target: Felt, selector: Felt },

    /// Operation needs a signing round but no grantor has been set.
    #[error("grantor class not set; request a signing round first")]
    GrantorNotSet,

    /// A different grantor is bound to the current signing round.
    #[error("grantor class already set to {current}, refusing {requested} without a reset")]
    GrantorAlreadySet { current: Felt, requested: Felt },

    #[error("policy set is empty")]
    EmptyPolicySet,

    /// Attached policy tree does not commit to the request's policy root.
    #[error("policy root mismatch: request commits to {expected}, tree root is {actual}")]
    PolicyRootMismatch { expected: Felt, actual: Felt },

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Result type alias for authorization operations.
pub type Result<T> = std::result::Result<T, AuthError>;
