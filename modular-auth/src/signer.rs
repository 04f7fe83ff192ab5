//! Signing collaborators: turn a commitment into signature parts the validator understands.

use alloy_primitives::U256;
use k256::ecdsa::SigningKey;
use modular_auth_types::Felt;
use sha3::{Digest, Keccak256};

use crate::error::{AuthError, Result};

/// Anything that can sign a field-element message.
pub trait MessageSigner {
    fn sign(&self, message: &Felt) -> Result<Vec<Felt>>;
}

/// secp256k1 signer for Ethereum-style validators.
///
/// Signatures are laid out as `[r.low, r.high, s.low, s.high, y_parity]` with 128-bit halves,
/// since `r` and `s` do not fit a single field element.
pub struct EthSigner {
    key: SigningKey,
}

impl EthSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Build from a 32-byte big-endian private key.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(bytes).map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn verifying_key(&self) -> &k256::ecdsa::VerifyingKey {
        self.key.verifying_key()
    }

    /// 160-bit Ethereum address of the key: low 20 bytes of keccak256 over the uncompressed point.
    pub fn address(&self) -> Felt {
        let point = self.key.verifying_key().to_encoded_point(false);
        let mut h = Keccak256::new();
        h.update(&point.as_bytes()[1..]);
        let out = h.finalize();
        Felt::reduce(U256::from_be_slice(&out[12..32]))
    }
}

impl MessageSigner for EthSigner {
    fn sign(&self, message: &Felt) -> Result<Vec<Felt>> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&message.to_be_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let (r, s) = signature.split_bytes();

        let mut parts = Vec::with_capacity(5);
        for word in [r.as_slice(), s.as_slice()] {
            let (low, high) = split_u256(U256::from_be_slice(word));
            parts.push(low);
            parts.push(high);
        }
        parts.push(Felt::from(recovery_id.is_y_odd()));
        Ok(parts)
    }
}

/// `(low, high)` 128-bit halves of a 256-bit word.
fn split_u256(value: U256) -> (Felt, Felt) {
    let limbs = value.as_limbs();
    let low = u128::from(limbs[0]) | (u128::from(limbs[1]) << 64);
    let high = u128::from(limbs[2]) | (u128::from(limbs[3]) << 64);
    (Felt::from(low), Felt::from(high))
}
