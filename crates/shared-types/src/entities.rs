//! # Core Chain Scalars
//!
//! The source chain speaks in field elements ("felts"): 252-bit scalars that
//! carry addresses, identifiers and amounts alike. Amounts are widened to
//! `U256` once decoded so arithmetic can be checked.

use crate::errors::FeltParseError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

/// Height of a block on the source chain.
pub type BlockNumber = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// A fixed-width field element, stored big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Felt(pub [u8; 32]);

/// Contract and account addresses are field elements.
pub type Address = Felt;

impl Felt {
    /// The zero element.
    pub const ZERO: Felt = Felt([0u8; 32]);

    /// Raw big-endian bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Interpret the element as an unsigned 256-bit integer.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Build an element from an unsigned 256-bit integer.
    #[must_use]
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }

    /// Whether this is the zero element.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self::from_u256(U256::from(value))
    }
}

impl From<[u8; 32]> for Felt {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self)
    }
}

impl FromStr for Felt {
    type Err = FeltParseError;

    /// Accepts `0x`-prefixed or bare hex, with or without leading zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.is_empty() {
            return Err(FeltParseError::Empty);
        }
        if digits.len() > 64 {
            return Err(FeltParseError::TooLong {
                digits: digits.len(),
            });
        }

        let padded = format!("{:0>64}", digits);
        let decoded =
            hex::decode(&padded).map_err(|e| FeltParseError::InvalidHex(e.to_string()))?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
