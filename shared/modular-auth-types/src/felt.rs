use core::{fmt, str::FromStr};

use alloy_primitives::{keccak256, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Field prime: 2^251 + 17 * 2^192 + 1.
pub const FIELD_PRIME: U256 = U256::from_limbs([1, 0, 0, 0x0800_0000_0000_0011]);

/// Longest ASCII string that fits into a single field element.
pub const MAX_SHORT_STRING_LEN: usize = 31;

/// Entrypoint names that resolve to the zero selector.
const DEFAULT_ENTRYPOINT_NAME: &str = "__default__";
const DEFAULT_L1_ENTRYPOINT_NAME: &str = "__l1_default__";

/// Errors while constructing field elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeltError {
    /// Value is not strictly below the field prime.
    OutOfRange,
    /// Text is neither `0x`-prefixed hex nor a decimal integer.
    InvalidNumber,
    /// Short strings hold at most 31 bytes.
    ShortStringTooLong { len: usize },
    NonAsciiShortString,
}

impl fmt::Display for FeltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeltError::OutOfRange => f.write_str("value is not below the field prime"),
            FeltError::InvalidNumber => f.write_str("expected 0x-prefixed hex or a decimal integer"),
            FeltError::ShortStringTooLong { len } => write!(
                f,
                "short string is {len} bytes, at most {MAX_SHORT_STRING_LEN} are allowed"
            ),
            FeltError::NonAsciiShortString => f.write_str("short strings must be ASCII"),
        }
    }
}

impl std::error::Error for FeltError {}

/// Element of the prime field used for hashes, addresses, selectors and calldata.
///
/// The inner value is always `< FIELD_PRIME`; every constructor either checks the range or
/// reduces explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Felt(U256);

impl Felt {
    pub const ZERO: Felt = Felt(U256::ZERO);
    pub const ONE: Felt = Felt(U256::from_limbs([1, 0, 0, 0]));
    pub const MAX: Felt = Felt(U256::from_limbs([0, 0, 0, 0x0800_0000_0000_0011]));

    /// Checked construction from a 256-bit integer.
    pub fn new(value: U256) -> Result<Self, FeltError> {
        if value < FIELD_PRIME {
            Ok(Felt(value))
        } else {
            Err(FeltError::OutOfRange)
        }
    }

    /// Reduce an arbitrary 256-bit integer into the field.
    pub fn reduce(value: U256) -> Self {
        Felt(value % FIELD_PRIME)
    }

    pub const fn from_u64(value: u64) -> Self {
        Felt(U256::from_limbs([value, 0, 0, 0]))
    }

    pub fn from_u128(value: u128) -> Self {
        Felt(U256::from(value))
    }

    /// Big-endian bytes, at most 32 of them.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, FeltError> {
        if bytes.len() > 32 {
            return Err(FeltError::OutOfRange);
        }
        Self::new(U256::from_be_slice(bytes))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }

    /// Parse `0x`-prefixed hex.
    pub fn from_hex(text: &str) -> Result<Self, FeltError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or(FeltError::InvalidNumber)?;
        if digits.is_empty() || digits.len() > 64 {
            return Err(FeltError::InvalidNumber);
        }
        let value = U256::from_str_radix(digits, 16).map_err(|_| FeltError::InvalidNumber)?;
        Self::new(value)
    }

    pub fn from_dec_str(text: &str) -> Result<Self, FeltError> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FeltError::InvalidNumber);
        }
        let value = U256::from_str_radix(text, 10).map_err(|_| FeltError::OutOfRange)?;
        Self::new(value)
    }

    /// Encode up to 31 ASCII bytes big-endian into one element.
    pub fn from_short_string(text: &str) -> Result<Self, FeltError> {
        if !text.is_ascii() {
            return Err(FeltError::NonAsciiShortString);
        }
        if text.len() > MAX_SHORT_STRING_LEN {
            return Err(FeltError::ShortStringTooLong { len: text.len() });
        }
        Ok(Felt(U256::from_be_slice(text.as_bytes())))
    }

    /// Compile-time variant of [`Felt::from_short_string`]; panics during const evaluation on
    /// invalid input.
    pub const fn short_string(text: &str) -> Self {
        let bytes = text.as_bytes();
        assert!(bytes.len() <= MAX_SHORT_STRING_LEN, "short string longer than 31 bytes");
        let mut limbs = [0u64; 4];
        let mut i = 0;
        while i < bytes.len() {
            assert!(bytes[i].is_ascii(), "short string must be ASCII");
            let shift = (bytes.len() - 1 - i) * 8;
            limbs[shift / 64] |= (bytes[i] as u64) << (shift % 64);
            i += 1;
        }
        Felt(U256::from_limbs(limbs))
    }

    /// Keccak-256 digest truncated to its low 250 bits.
    pub fn from_keccak_digest(digest: [u8; 32]) -> Self {
        let mut masked = digest;
        masked[0] &= 0x03;
        Felt(U256::from_be_slice(&masked))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_u64(&self) -> Option<u64> {
        let limbs = self.0.as_limbs();
        if limbs[1..].iter().all(|limb| *limb == 0) {
            Some(limbs[0])
        } else {
            None
        }
    }
}

/// Keccak-256 of `bytes`, truncated to 250 bits.
pub fn starknet_keccak(bytes: &[u8]) -> Felt {
    Felt::from_keccak_digest(keccak256(bytes).0)
}

/// Entrypoint selector for a human-readable entrypoint name.
pub fn selector_from_name(name: &str) -> Felt {
    if name == DEFAULT_ENTRYPOINT_NAME || name == DEFAULT_L1_ENTRYPOINT_NAME {
        Felt::ZERO
    } else {
        starknet_keccak(name.as_bytes())
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt::from_u64(value)
    }
}

impl From<u32> for Felt {
    fn from(value: u32) -> Self {
        Felt::from_u64(value.into())
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt::from_u128(value)
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        Felt::from_u64(value.into())
    }
}

impl TryFrom<U256> for Felt {
    type Error = FeltError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        Felt::new(value)
    }
}

impl From<Felt> for U256 {
    fn from(value: Felt) -> Self {
        value.0
    }
}

impl FromStr for Felt {
    type Err = FeltError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.starts_with("0x") || text.starts_with("0X") {
            Felt::from_hex(text)
        } else {
            Felt::from_dec_str(text)
        }
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeltVisitor;

        impl<'de> de::Visitor<'de> for FeltVisitor {
            type Value = Felt;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field element as a hex/decimal string or an unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Felt, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Felt, E> {
                Ok(Felt::from_u64(v))
            }
        }

        deserializer.deserialize_any(FeltVisitor)
    }
}
