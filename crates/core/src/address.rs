//! EVM address newtype with validation and event-topic conversion.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing addresses or log topics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be 0x followed by 40 hex characters")]
    BadFormat,

    #[error("topic must be 0x followed by 64 hex characters")]
    BadTopic,
}

/// A 20-byte EVM account address.
///
/// Parsed from the canonical `0x` + 40 hex form (case-insensitive),
/// always displayed lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// Raw address bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Extract an address from a 32-byte log topic.
    ///
    /// Indexed address arguments are left-padded to 32 bytes; the
    /// address occupies the low 20 bytes.
    pub fn from_topic(topic: &str) -> Result<Self, AddressError> {
        let digits = topic.strip_prefix("0x").ok_or(AddressError::BadTopic)?;
        if digits.len() != 64 {
            return Err(AddressError::BadTopic);
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(&digits[24..], &mut bytes).map_err(|_| AddressError::BadTopic)?;
        Ok(Address(bytes))
    }

    /// Render as a 32-byte log topic (left-padded with zeros).
    pub fn to_topic(&self) -> String {
        format!("0x000000000000000000000000{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::BadFormat)?;
        if digits.len() != 40 {
            return Err(AddressError::BadFormat);
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::BadFormat)?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
