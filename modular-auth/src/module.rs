//! Pluggable validator modules.
//!
//! A module turns a batch of calls into a [`PrefixCall`] aimed at the account's
//! `__module_validate__` entrypoint. Calldata is a length-prefixed felt list:
//!
//! - session key: `[len, validator_class, grantor_class, session_key, expiry, policy_root,
//!   sig_len, sig.., (root != 0) proof_len, proof(call_0).., proof(call_1)..]`
//! - simple validator: `[1, validator_class]`

use std::sync::Arc;

use modular_auth_types::{Call, Felt, PrefixCall};

use crate::{
    authorization::AuthorizationRequest,
    error::{AuthError, Result},
    hash::{PairHasher, Pedersen},
    merkle::PolicyMerkleTree,
};

/// Capability shared by all validator modules.
pub trait Module {
    /// Build the prefix call authorizing `calls`. Does not consume or change module state.
    fn prefix(&self, calls: &[Call]) -> Result<PrefixCall>;

    fn prefix_one(&self, call: &Call) -> Result<PrefixCall> {
        self.prefix(std::slice::from_ref(call))
    }

    /// The batch to submit: prefix call first, then `calls` unchanged.
    fn with_prefix(&self, calls: Vec<Call>) -> Result<Vec<Call>> {
        let prefix = self.prefix(&calls)?;
        let mut batch = Vec::with_capacity(calls.len() + 1);
        batch.push(prefix.into_call());
        batch.extend(calls);
        Ok(batch)
    }
}

/// Wrap `body` with its element count.
fn length_prefixed(body: Vec<Felt>) -> Vec<Felt> {
    let mut calldata = Vec::with_capacity(body.len() + 1);
    calldata.push(Felt::from(body.len() as u64));
    calldata.extend(body);
    calldata
}

/// How a session-key prefix treats calls the policy tree does not cover.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchCoverage {
    /// Every call must match a policy; otherwise `PolicyNotFound`.
    #[default]
    Required,
    /// Uncovered calls are skipped and left for the on-chain validator to reject.
    BestEffort,
}

/// Session-key validator module: authorization request plus optional policy tree.
#[derive(Clone, Debug)]
pub struct SessionKeyModule<H = Pedersen> {
    request: AuthorizationRequest<H>,
    tree: Option<Arc<PolicyMerkleTree<H>>>,
    coverage: BatchCoverage,
}

impl<H: PairHasher> SessionKeyModule<H> {
    /// Unscoped session key; the request must commit to a zero policy root.
    pub fn new(request: AuthorizationRequest<H>) -> Result<Self> {
        if !request.policy_root().is_zero() {
            return Err(AuthError::PolicyRootMismatch {
                expected: request.policy_root(),
                actual: Felt::ZERO,
            });
        }
        Ok(Self {
            request,
            tree: None,
            coverage: BatchCoverage::default(),
        })
    }

    /// Session key scoped to the policies of `tree`.
    pub fn with_tree(request: AuthorizationRequest<H>, tree: Arc<PolicyMerkleTree<H>>) -> Result<Self> {
        if request.policy_root() != tree.root() {
            return Err(AuthError::PolicyRootMismatch {
                expected: request.policy_root(),
                actual: tree.root(),
            });
        }
        Ok(Self {
            request,
            tree: Some(tree),
            coverage: BatchCoverage::default(),
        })
    }

    pub fn with_coverage(mut self, coverage: BatchCoverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn request(&self) -> &AuthorizationRequest<H> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut AuthorizationRequest<H> {
        &mut self.request
    }

    pub fn tree(&self) -> Option<&PolicyMerkleTree<H>> {
        self.tree.as_deref()
    }

    pub fn coverage(&self) -> BatchCoverage {
        self.coverage
    }

    pub fn request_signing_round(&mut self, grantor: Felt) -> Result<Felt> {
        self.request.request_signing_round(grantor)
    }

    pub fn append_signature<I: IntoIterator<Item = Felt>>(&mut self, parts: I) -> Result<()> {
        self.request.append_signature(parts)
    }

    pub fn reset_grantor(&mut self) {
        self.request.reset_grantor();
    }

    /// Proofs for each call, in batch order.
    fn proofs(&self, tree: &PolicyMerkleTree<H>, calls: &[Call]) -> Result<Vec<Vec<Felt>>> {
        let mut proofs = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            match (tree.proof(&call.policy()), self.coverage) {
                (Ok(proof), _) => proofs.push(proof),
                (Err(err), BatchCoverage::Required) => return Err(err),
                (Err(_), BatchCoverage::BestEffort) => {
                    tracing::warn!(
                        index,
                        call_target = %call.target,
                        selector = %call.selector,
                        "call not covered by session policies; no proof attached"
                    );
                }
            }
        }
        Ok(proofs)
    }
}

impl<H: PairHasher> Module for SessionKeyModule<H> {
    fn prefix(&self, calls: &[Call]) -> Result<PrefixCall> {
        let grantor = self.request.grantor().ok_or(AuthError::GrantorNotSet)?;
        let signature = self.request.signature();

        let mut body = Vec::with_capacity(6 + signature.len());
        body.push(self.request.validator_class());
        body.push(grantor);
        body.push(self.request.session_key());
        body.push(Felt::from(self.request.expiry()));
        body.push(self.request.policy_root());
        body.push(Felt::from(signature.len() as u64));
        body.extend_from_slice(signature);

        if let Some(tree) = self.tree.as_deref() {
            let proofs = self.proofs(tree, calls)?;
            // All proofs share the tree depth, so one length field describes every proof.
            body.push(Felt::from(tree.depth() as u64));
            body.extend(proofs.into_iter().flatten());
        }

        tracing::debug!(
            account = %self.request.account(),
            calls = calls.len(),
            calldata_len = body.len() + 1,
            "session key prefix assembled"
        );
        Ok(PrefixCall::new(self.request.account(), length_prefixed(body)))
    }
}

/// Signature scheme of a simple single-key validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidatorKind {
    Stark,
    Eth,
}

/// Module that only names the validator class to run; no policy scoping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimpleValidatorModule {
    account: Felt,
    validator_class: Felt,
    kind: ValidatorKind,
}

impl SimpleValidatorModule {
    pub fn new(kind: ValidatorKind, account: Felt, validator_class: Felt) -> Self {
        Self {
            account,
            validator_class,
            kind,
        }
    }

    pub fn stark(account: Felt, validator_class: Felt) -> Self {
        Self::new(ValidatorKind::Stark, account, validator_class)
    }

    pub fn eth(account: Felt, validator_class: Felt) -> Self {
        Self::new(ValidatorKind::Eth, account, validator_class)
    }

    pub fn kind(&self) -> ValidatorKind {
        self.kind
    }

    pub fn validator_class(&self) -> Felt {
        self.validator_class
    }
}

impl Module for SimpleValidatorModule {
    fn prefix(&self, _calls: &[Call]) -> Result<PrefixCall> {
        Ok(PrefixCall::new(
            self.account,
            length_prefixed(vec![self.validator_class]),
        ))
    }
}
