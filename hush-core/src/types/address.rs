//! Account address type for HUSH.
//!
//! [`AccountAddress`] is the 20-byte identifier of both contracts and users.
//! Parsing follows the conventional textual form: `0x` followed by 40 hex
//! characters. Mixed-case input must carry a valid EIP-55 checksum.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::constants::ADDRESS_SIZE;
use crate::error::{HushError, Result};

/// A 20-byte account identifier (contract or externally owned account).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress {
    bytes: [u8; ADDRESS_SIZE],
}

impl AccountAddress {
    /// The zero address.
    pub const ZERO: Self = Self {
        bytes: [0u8; ADDRESS_SIZE],
    };

    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(HushError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates from a fixed-size array.
    pub fn from_array(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.bytes
    }

    /// Parses the `0x`-prefixed textual form.
    ///
    /// All-lowercase and all-uppercase inputs are accepted as is; mixed-case
    /// inputs must match their EIP-55 checksum.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| HushError::InvalidAddress(format!("missing 0x prefix: {s:?}")))?;

        if digits.len() != ADDRESS_SIZE * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HushError::InvalidAddress(format!(
                "expected 40 hex characters: {s:?}"
            )));
        }

        let bytes = hex::decode(digits).map_err(|e| HushError::InvalidAddress(e.to_string()))?;
        let address = Self::from_bytes(&bytes)?;

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum_string() != s {
            return Err(HushError::InvalidAddress(format!("bad EIP-55 checksum: {s}")));
        }

        Ok(address)
    }

    /// Returns the lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Returns the EIP-55 checksummed form.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.bytes);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.bytes == [0u8; ADDRESS_SIZE]
    }
}

impl std::str::FromStr for AccountAddress {
    type Err = HushError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl std::fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountAddress({})", self.to_checksum_string())
    }
}

impl std::fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_checksum_string())
    }
}

impl Serialize for AccountAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
