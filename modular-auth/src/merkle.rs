//! Merkle tree over session-key policies.
//!
//! Leaf = `H(target, selector)`, node = `H(min(a, b), max(a, b))`. An odd node at the end of a
//! level is paired with zero, so every proof is exactly `depth` elements long and the verifier
//! folds `node(current, sibling)` without direction bits. The padding and pair ordering rules
//! must match the on-chain verifier; change them together or not at all.
//!
//! This is the starknet.js `merkle` convention (sorted pair, zero padding, Pedersen), which the
//! account's session-key validator folds proofs with. Swapping two leaves that share a parent
//! therefore keeps the root.

use modular_auth_types::{Felt, Policy};

use crate::{
    error::{AuthError, Result},
    hash::{PairHasher, Pedersen},
};

/// Leaf commitment for one policy.
pub fn policy_leaf<H: PairHasher>(hasher: &H, policy: &Policy) -> Felt {
    hasher.hash(&policy.target, &policy.selector)
}

/// Order-independent combination of two sibling nodes.
pub fn node_hash<H: PairHasher>(hasher: &H, a: &Felt, b: &Felt) -> Felt {
    if a <= b {
        hasher.hash(a, b)
    } else {
        hasher.hash(b, a)
    }
}

/// Fold `proof` upwards from `leaf` and compare against `root`.
pub fn verify_proof<H: PairHasher>(hasher: &H, root: &Felt, leaf: &Felt, proof: &[Felt]) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, sibling| node_hash(hasher, &current, sibling));
    computed == *root
}

/// Binary Merkle tree over an ordered, non-empty policy list.
///
/// Immutable once built; share it behind an `Arc` between modules that prove calls against it.
#[derive(Clone, Debug)]
pub struct PolicyMerkleTree<H = Pedersen> {
    hasher: H,
    policies: Vec<Policy>,
    /// `levels[0]` holds the leaves, the last level holds only the root.
    levels: Vec<Vec<Felt>>,
}

impl PolicyMerkleTree {
    pub fn new(policies: Vec<Policy>) -> Result<Self> {
        Self::with_hasher(Pedersen, policies)
    }
}

impl<H: PairHasher> PolicyMerkleTree<H> {
    pub fn with_hasher(hasher: H, policies: Vec<Policy>) -> Result<Self> {
        if policies.is_empty() {
            return Err(AuthError::EmptyPolicySet);
        }

        let leaves: Vec<Felt> = policies.iter().map(|p| policy_leaf(&hasher, p)).collect();
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| node_hash(&hasher, &pair[0], pair.get(1).unwrap_or(&Felt::ZERO)))
                .collect();
            levels.push(next);
        }

        let tree = Self {
            hasher,
            policies,
            levels,
        };
        tracing::debug!(
            policies = tree.policies.len(),
            depth = tree.depth(),
            root = %tree.root(),
            "built policy tree"
        );
        Ok(tree)
    }

    pub fn root(&self) -> Felt {
        // Construction guarantees a non-empty top level.
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Felt::ZERO)
    }

    /// Number of hashing levels between a leaf and the root.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn contains(&self, policy: &Policy) -> bool {
        self.position(policy).is_some()
    }

    pub fn leaf(&self, policy: &Policy) -> Felt {
        policy_leaf(&self.hasher, policy)
    }

    /// Sibling path from the policy's leaf to the root, bottom-up.
    ///
    /// Duplicated policies are proven at their first position.
    pub fn proof(&self, policy: &Policy) -> Result<Vec<Felt>> {
        let mut index = self.position(policy).ok_or(AuthError::PolicyNotFound {
            target: policy.target,
            selector: policy.selector,
        })?;

        let mut proof = Vec::with_capacity(self.depth());
        for level in &self.levels[..self.depth()] {
            let sibling = level.get(index ^ 1).copied().unwrap_or(Felt::ZERO);
            proof.push(sibling);
            index /= 2;
        }
        Ok(proof)
    }

    /// Check a proof for `policy` against this tree's root.
    pub fn verify(&self, policy: &Policy, proof: &[Felt]) -> bool {
        verify_proof(&self.hasher, &self.root(), &self.leaf(policy), proof)
    }

    fn position(&self, policy: &Policy) -> Option<usize> {
        self.policies.iter().position(|p| p == policy)
    }
}
