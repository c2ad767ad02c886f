//! Ciphertext handles and encrypted inputs.
//!
//! - [`CiphertextHandle`]: opaque on-chain reference to an encrypted value
//! - [`HandleRef`]: a handle paired with the contract that exposes it
//! - [`EncryptedInput`]: handles plus the proof binding them to a contract and user

use serde::{Deserialize, Serialize};

use super::AccountAddress;
use crate::constants::{
    HANDLE_CHAIN_ID_OFFSET, HANDLE_HASH_LEN, HANDLE_INDEX_OFFSET, HANDLE_SIZE, HANDLE_TYPE_OFFSET,
    HANDLE_VERSION_OFFSET,
};
use crate::error::{HushError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// CIPHERTEXT HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte ciphertext handle.
///
/// # Layout
/// ```text
/// hash (21) || index (1) || chain id (8, BE) || fhe type (1) || version (1)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CiphertextHandle {
    bytes: [u8; HANDLE_SIZE],
}

impl CiphertextHandle {
    /// Assembles a handle from its layout fields.
    pub fn from_parts(
        hash: &[u8; HANDLE_HASH_LEN],
        index: u8,
        chain_id: u64,
        fhe_type: u8,
        version: u8,
    ) -> Self {
        let mut bytes = [0u8; HANDLE_SIZE];
        bytes[..HANDLE_HASH_LEN].copy_from_slice(hash);
        bytes[HANDLE_INDEX_OFFSET] = index;
        bytes[HANDLE_CHAIN_ID_OFFSET..HANDLE_TYPE_OFFSET].copy_from_slice(&chain_id.to_be_bytes());
        bytes[HANDLE_TYPE_OFFSET] = fhe_type;
        bytes[HANDLE_VERSION_OFFSET] = version;
        Self { bytes }
    }

    /// Creates a handle from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HANDLE_SIZE {
            return Err(HushError::InvalidHandle(format!(
                "expected {} bytes, got {}",
                HANDLE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HANDLE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Parses a hex handle, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().strip_prefix("0x").unwrap_or(s.trim());
        let bytes = hex::decode(digits).map_err(|e| HushError::InvalidHandle(format!("{s:?}: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HANDLE_SIZE] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed lowercase hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Position of this ciphertext within its encrypted input.
    pub fn index(&self) -> u8 {
        self.bytes[HANDLE_INDEX_OFFSET]
    }

    /// Chain id the handle was created for.
    pub fn chain_id(&self) -> u64 {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.bytes[HANDLE_CHAIN_ID_OFFSET..HANDLE_TYPE_OFFSET]);
        u64::from_be_bytes(id)
    }

    /// FHE type tag of the encrypted value.
    pub fn fhe_type(&self) -> u8 {
        self.bytes[HANDLE_TYPE_OFFSET]
    }

    /// Layout version.
    pub fn version(&self) -> u8 {
        self.bytes[HANDLE_VERSION_OFFSET]
    }
}

impl std::str::FromStr for CiphertextHandle {
    type Err = HushError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl std::fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CiphertextHandle({})", self.to_hex())
    }
}

impl std::fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLE REF
// ═══════════════════════════════════════════════════════════════════════════════

/// A handle paired with the contract that exposes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRef {
    /// The ciphertext handle
    pub handle: CiphertextHandle,
    /// Contract the handle was read from
    pub contract_address: AccountAddress,
}

impl HandleRef {
    /// Creates a new handle reference.
    pub fn new(handle: CiphertextHandle, contract_address: AccountAddress) -> Self {
        Self {
            handle,
            contract_address,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCRYPTED INPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Ciphertexts ready for inclusion in a transaction argument list.
///
/// One handle per logical field, in submission order. The proof binds every
/// handle to one `(contract, user)` pair; any other pair is rejected by the
/// chain-side input verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInput {
    /// One handle per encrypted field
    pub handles: Vec<CiphertextHandle>,
    /// Binding proof passed alongside the handles
    #[serde(with = "hex")]
    pub input_proof: Vec<u8>,
}

impl EncryptedInput {
    /// Creates an encrypted input.
    pub fn new(handles: Vec<CiphertextHandle>, input_proof: Vec<u8>) -> Self {
        Self {
            handles,
            input_proof,
        }
    }

    /// Number of encrypted fields.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no field was encrypted.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
