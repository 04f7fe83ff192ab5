//! Session-key authorization request and its chained commitment.
//!
//! Lifecycle:
//! `Unbound --request_signing_round--> GrantorSet --append_signature--> Signed`,
//! and `reset_grantor` returns to `Unbound` from either bound state. The accumulated signature
//! survives a reset; only `clear_signature` drops it.

use modular_auth_types::Felt;

use crate::{
    error::{AuthError, Result},
    hash::{HashChain, PairHasher, Pedersen},
    signer::MessageSigner,
};

/// Parameters fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub account: Felt,
    pub validator_class: Felt,
    /// Public key of the delegated session signer.
    pub session_key: Felt,
    /// Unix timestamp after which the session is rejected on-chain.
    pub expiry: u64,
    /// Root of the policy tree; zero for an unscoped session key.
    pub policy_root: Felt,
    pub chain_id: Felt,
}

/// Signing-round state of an [`AuthorizationRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationState {
    Unbound,
    GrantorSet { grantor: Felt },
    Signed { grantor: Felt },
}

impl AuthorizationState {
    pub fn grantor(&self) -> Option<Felt> {
        match self {
            AuthorizationState::Unbound => None,
            AuthorizationState::GrantorSet { grantor } | AuthorizationState::Signed { grantor } => {
                Some(*grantor)
            }
        }
    }
}

/// Delegation of signing authority to a session key, bound to one grantor per signing round.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest<H = Pedersen> {
    hasher: H,
    params: SessionParams,
    state: AuthorizationState,
    signature: Vec<Felt>,
}

impl AuthorizationRequest {
    pub fn new(params: SessionParams) -> Self {
        Self::with_hasher(Pedersen, params)
    }
}

impl<H: PairHasher> AuthorizationRequest<H> {
    pub fn with_hasher(hasher: H, params: SessionParams) -> Self {
        Self {
            hasher,
            params,
            state: AuthorizationState::Unbound,
            signature: Vec::new(),
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn account(&self) -> Felt {
        self.params.account
    }

    pub fn validator_class(&self) -> Felt {
        self.params.validator_class
    }

    pub fn session_key(&self) -> Felt {
        self.params.session_key
    }

    pub fn expiry(&self) -> u64 {
        self.params.expiry
    }

    pub fn policy_root(&self) -> Felt {
        self.params.policy_root
    }

    pub fn chain_id(&self) -> Felt {
        self.params.chain_id
    }

    pub fn state(&self) -> AuthorizationState {
        self.state
    }

    pub fn grantor(&self) -> Option<Felt> {
        self.state.grantor()
    }

    pub fn signature(&self) -> &[Felt] {
        &self.signature
    }

    /// The value the grantor signs.
    pub fn commitment_hash(&self) -> Result<Felt> {
        let grantor = self.grantor().ok_or(AuthError::GrantorNotSet)?;
        Ok(self.commitment_for(grantor))
    }

    /// Bind `grantor` to this signing round and return the commitment to sign.
    ///
    /// Repeating the call with the bound grantor is a no-op.
    pub fn request_signing_round(&mut self, grantor: Felt) -> Result<Felt> {
        let next = match self.state {
            AuthorizationState::Unbound if self.signature.is_empty() => {
                AuthorizationState::GrantorSet { grantor }
            }
            AuthorizationState::Unbound => AuthorizationState::Signed { grantor },
            bound => match bound.grantor() {
                Some(current) if current == grantor => bound,
                Some(current) => {
                    return Err(AuthError::GrantorAlreadySet {
                        current,
                        requested: grantor,
                    })
                }
                None => bound,
            },
        };
        let commitment = self.commitment_for(grantor);
        if next != self.state {
            tracing::debug!(
                account = %self.params.account,
                %grantor,
                %commitment,
                "signing round requested"
            );
        }
        self.state = next;
        Ok(commitment)
    }

    /// Append signature parts produced externally for the current commitment.
    ///
    /// No cryptographic check happens here; the on-chain validator verifies the parts.
    pub fn append_signature<I: IntoIterator<Item = Felt>>(&mut self, parts: I) -> Result<()> {
        let grantor = self.grantor().ok_or(AuthError::GrantorNotSet)?;
        let before = self.signature.len();
        self.signature.extend(parts);
        if self.signature.len() > before {
            self.state = AuthorizationState::Signed { grantor };
            tracing::debug!(
                account = %self.params.account,
                parts = self.signature.len() - before,
                total = self.signature.len(),
                "signature appended"
            );
        }
        Ok(())
    }

    /// Sign the current commitment with `signer` and append the result.
    pub fn sign_with<S: MessageSigner + ?Sized>(&mut self, signer: &S) -> Result<()> {
        let commitment = self.commitment_hash()?;
        let parts = signer.sign(&commitment)?;
        self.append_signature(parts)
    }

    /// Unbind the grantor so a new signing round may start. The signature is kept.
    pub fn reset_grantor(&mut self) {
        if let Some(grantor) = self.grantor() {
            tracing::debug!(account = %self.params.account, %grantor, "grantor reset");
        }
        self.state = AuthorizationState::Unbound;
    }

    pub fn clear_signature(&mut self) {
        self.signature.clear();
        if let AuthorizationState::Signed { grantor } = self.state {
            self.state = AuthorizationState::GrantorSet { grantor };
        }
    }

    fn commitment_for(&self, grantor: Felt) -> Felt {
        let p = &self.params;
        HashChain::new(&self.hasher)
            .update(p.account)
            .update(p.validator_class)
            .update(grantor)
            .update(p.session_key)
            .update(Felt::from(p.expiry))
            .update(p.policy_root)
            .update(p.chain_id)
            .finalize()
    }
}
