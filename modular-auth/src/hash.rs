//! Two-ary hash primitive and the chained commitment built on top of it.
//!
//! Every hash in this crate goes through [`PairHasher`]. [`Pedersen`] is the default and matches
//! what the network computes for contract addresses and `compute_hash_on_elements`;
//! [`StarkKeccak`] is a cheaper alternative for commitments that never leave this process.

use alloy_primitives::U256;
use modular_auth_types::Felt;
use sha3::{Digest, Keccak256};
use starknet_types_core::felt::Felt as StarkFelt;

/// Deterministic, collision-resistant combinator of two field elements.
pub trait PairHasher {
    fn hash(&self, left: &Felt, right: &Felt) -> Felt;
}

/// Pedersen hash over the Stark curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pedersen;

impl PairHasher for Pedersen {
    fn hash(&self, left: &Felt, right: &Felt) -> Felt {
        let out = starknet_crypto::pedersen_hash(
            &StarkFelt::from_bytes_be(&left.to_be_bytes()),
            &StarkFelt::from_bytes_be(&right.to_be_bytes()),
        );
        // Output is already below the prime; reduce is a no-op.
        Felt::reduce(U256::from_be_bytes(out.to_bytes_be()))
    }
}

/// Keccak-256 over the two big-endian 32-byte words, truncated to 250 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StarkKeccak;

impl PairHasher for StarkKeccak {
    fn hash(&self, left: &Felt, right: &Felt) -> Felt {
        let mut h = Keccak256::new();
        h.update(left.to_be_bytes());
        h.update(right.to_be_bytes());
        let out = h.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(out.as_slice());
        Felt::from_keccak_digest(digest)
    }
}

/// Incremental n-ary commitment: left fold from zero, then bind the element count.
///
/// `H(...H(H(0, e0), e1)..., en-1), n)`
pub struct HashChain<'a, H: PairHasher> {
    hasher: &'a H,
    acc: Felt,
    len: u64,
}

impl<'a, H: PairHasher> HashChain<'a, H> {
    pub fn new(hasher: &'a H) -> Self {
        Self {
            hasher,
            acc: Felt::ZERO,
            len: 0,
        }
    }

    pub fn update(mut self, element: Felt) -> Self {
        self.acc = self.hasher.hash(&self.acc, &element);
        self.len += 1;
        self
    }

    pub fn extend<I: IntoIterator<Item = Felt>>(self, elements: I) -> Self {
        elements.into_iter().fold(self, HashChain::update)
    }

    pub fn finalize(self) -> Felt {
        self.hasher.hash(&self.acc, &Felt::from(self.len))
    }
}

/// Chained commitment over an ordered slice of elements.
pub fn hash_on_elements<H: PairHasher>(hasher: &H, elements: &[Felt]) -> Felt {
    HashChain::new(hasher).extend(elements.iter().copied()).finalize()
}
