//! Decryption authorization types.
//!
//! - [`AuthorizationWindow`]: validity interval of an authorization
//! - [`TypedMessage`]: the EIP-712 document a wallet signs
//! - [`AuthorizationArtifact`]: unsigned, contract-scoped authorization
//! - [`WalletSignature`]: the wallet's signature over a typed message
//! - [`DecryptionRequest`]: everything the KMS needs to release plaintexts

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{AccountAddress, CiphertextHandle, HandleRef, PublicKey};
use crate::constants::{
    DEFAULT_AUTHORIZATION_DAYS, EIP712_DOMAIN_NAME, EIP712_DOMAIN_VERSION, EIP712_PRIMARY_TYPE,
    SECONDS_PER_DAY, SIGNATURE_SIZE,
};
use crate::error::{HushError, Result};

/// Plaintexts released by a decryption request, keyed by handle.
pub type DecryptedValues = HashMap<CiphertextHandle, u64>;

// ═══════════════════════════════════════════════════════════════════════════════
// WINDOW
// ═══════════════════════════════════════════════════════════════════════════════

/// Validity window `[start, start + duration)` of an authorization.
///
/// The duration is expressed in whole days because that is what the signed
/// message carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationWindow {
    /// Unix seconds at which the authorization becomes valid
    pub start_timestamp: u64,
    /// Validity in days
    pub duration_days: u32,
}

impl AuthorizationWindow {
    /// Creates a window.
    pub fn new(start_timestamp: u64, duration_days: u32) -> Self {
        Self {
            start_timestamp,
            duration_days,
        }
    }

    /// Creates a window with the default 365-day policy.
    pub fn with_default_duration(start_timestamp: u64) -> Self {
        Self::new(start_timestamp, DEFAULT_AUTHORIZATION_DAYS)
    }

    /// Creates a default-length window starting now.
    pub fn starting_now() -> Self {
        Self::with_default_duration(unix_now())
    }

    /// Validity in seconds.
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_days) * SECONDS_PER_DAY
    }

    /// First second at which the window is no longer valid.
    pub fn end_timestamp(&self) -> u64 {
        self.start_timestamp.saturating_add(self.duration_seconds())
    }

    /// Returns true if `timestamp` lies inside the window.
    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start_timestamp && timestamp < self.end_timestamp()
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED MESSAGE (EIP-712)
// ═══════════════════════════════════════════════════════════════════════════════

/// One member of an EIP-712 struct type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    /// Member name
    pub name: String,
    /// Solidity type
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedField {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// EIP-712 domain of a user decryption authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDomain {
    /// Domain name
    pub name: String,
    /// Domain version
    pub version: String,
    /// Chain the authorization is valid on
    pub chain_id: u64,
    /// Contract anchoring the signature (the network's KMS verifier)
    pub verifying_contract: AccountAddress,
}

/// Message body of a user decryption authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptMessage {
    /// `0x`-prefixed public key values will be sealed to
    pub public_key: String,
    /// Contracts whose values may be decrypted
    pub contract_addresses: Vec<AccountAddress>,
    /// Chain the contracts live on
    pub contracts_chain_id: u64,
    /// Window start (unix seconds)
    pub start_timestamp: u64,
    /// Window length (days)
    pub duration_days: u32,
}

/// A signable EIP-712 document.
///
/// Serialization is canonical: identical inputs yield byte-identical JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedMessage {
    /// Struct type definitions, including `EIP712Domain`
    pub types: BTreeMap<String, Vec<TypedField>>,
    /// Name of the signed struct
    pub primary_type: String,
    /// Signing domain
    pub domain: TypedDomain,
    /// Signed values
    pub message: UserDecryptMessage,
}

impl TypedMessage {
    /// Builds the user decryption authorization document.
    pub fn user_decrypt(
        public_key: &PublicKey,
        contracts: &[AccountAddress],
        chain_id: u64,
        verifying_contract: AccountAddress,
        window: AuthorizationWindow,
    ) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "EIP712Domain".to_string(),
            vec![
                TypedField::new("name", "string"),
                TypedField::new("version", "string"),
                TypedField::new("chainId", "uint256"),
                TypedField::new("verifyingContract", "address"),
            ],
        );
        types.insert(
            EIP712_PRIMARY_TYPE.to_string(),
            vec![
                TypedField::new("publicKey", "bytes"),
                TypedField::new("contractAddresses", "address[]"),
                TypedField::new("contractsChainId", "uint256"),
                TypedField::new("startTimestamp", "uint256"),
                TypedField::new("durationDays", "uint256"),
            ],
        );

        Self {
            types,
            primary_type: EIP712_PRIMARY_TYPE.to_string(),
            domain: TypedDomain {
                name: EIP712_DOMAIN_NAME.to_string(),
                version: EIP712_DOMAIN_VERSION.to_string(),
                chain_id,
                verifying_contract,
            },
            message: UserDecryptMessage {
                public_key: format!("0x{}", public_key.to_hex()),
                contract_addresses: contracts.to_vec(),
                contracts_chain_id: chain_id,
                start_timestamp: window.start_timestamp,
                duration_days: window.duration_days,
            },
        }
    }

    /// Canonical JSON encoding handed to wallets.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The validity window stated in the message.
    pub fn window(&self) -> AuthorizationWindow {
        AuthorizationWindow::new(self.message.start_timestamp, self.message.duration_days)
    }

    /// Decodes the public key stated in the message.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_hex(&self.message.public_key)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARTIFACT
// ═══════════════════════════════════════════════════════════════════════════════

/// An unsigned, time-bounded, contract-scoped decryption authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationArtifact {
    /// The document the wallet must sign
    pub typed_message: TypedMessage,
    /// The window the document states
    pub window: AuthorizationWindow,
}

impl AuthorizationArtifact {
    /// Wraps a typed message.
    pub fn new(typed_message: TypedMessage) -> Self {
        let window = typed_message.window();
        Self {
            typed_message,
            window,
        }
    }

    /// Window start (unix seconds).
    pub fn start_timestamp(&self) -> u64 {
        self.window.start_timestamp
    }

    /// Window length in seconds.
    pub fn duration_seconds(&self) -> u64 {
        self.window.duration_seconds()
    }

    /// First second at which the artifact is no longer valid.
    pub fn expires_at(&self) -> u64 {
        self.window.end_timestamp()
    }

    /// Returns true if the artifact may still be used at `timestamp`.
    pub fn is_valid_at(&self, timestamp: u64) -> bool {
        self.window.contains(timestamp)
    }

    /// The contracts this artifact is scoped to.
    pub fn contracts(&self) -> &[AccountAddress] {
        &self.typed_message.message.contract_addresses
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURE
// ═══════════════════════════════════════════════════════════════════════════════

/// A 65-byte recoverable wallet signature (`r || s || v`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletSignature {
    bytes: [u8; SIGNATURE_SIZE],
}

impl WalletSignature {
    /// Creates a signature from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(HushError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Parses a hex signature, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| HushError::InvalidSignature(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }
}

impl std::fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletSignature({}..)", hex::encode(&self.bytes[..8]))
    }
}

impl std::fmt::Display for WalletSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for WalletSignature {
    type Err = HushError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECRYPTION REQUEST
// ═══════════════════════════════════════════════════════════════════════════════

/// A user decryption request.
///
/// `contract_addresses`, `user_address` and `window` must be exactly what the
/// signature was produced over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptionRequest {
    /// Handles to decrypt, each with the contract exposing it
    pub handles: Vec<HandleRef>,
    /// Contracts named by the authorization
    pub contract_addresses: Vec<AccountAddress>,
    /// The requesting (signing) user
    pub user_address: AccountAddress,
    /// Wallet signature over the authorization
    pub signature: WalletSignature,
    /// Validity window the signature covers
    pub window: AuthorizationWindow,
}

impl DecryptionRequest {
    /// Builds a request scoped to a single contract.
    pub fn for_contract(
        contract: AccountAddress,
        user: AccountAddress,
        signature: WalletSignature,
        handles: &[CiphertextHandle],
        window: AuthorizationWindow,
    ) -> Self {
        Self {
            handles: handles.iter().map(|h| HandleRef::new(*h, contract)).collect(),
            contract_addresses: vec![contract],
            user_address: user,
            signature,
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> AccountAddress {
        AccountAddress::from_hex("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
    }

    fn kms() -> AccountAddress {
        AccountAddress::from_hex("0x1364cbbf2cdf5032c47d8226a6f6fbd2afcdacac").unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let window = AuthorizationWindow::new(1_000, 1);
        assert_eq!(window.duration_seconds(), 86_400);
        assert!(window.contains(1_000));
        assert!(window.contains(87_399));
        assert!(!window.contains(87_400));
        assert!(!window.contains(999));
    }

    #[test]
    fn test_typed_message_is_deterministic() {
        let pk = PublicKey::from_bytes(&[7u8; 32]).unwrap();
        let window = AuthorizationWindow::with_default_duration(1_700_000_000);
        let a = TypedMessage::user_decrypt(&pk, &[contract()], 31337, kms(), window);
        let b = TypedMessage::user_decrypt(&pk, &[contract()], 31337, kms(), window);
        assert_eq!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }

    #[test]
    fn test_typed_message_shape() {
        let pk = PublicKey::from_bytes(&[7u8; 32]).unwrap();
        let window = AuthorizationWindow::with_default_duration(1_700_000_000);
        let msg = TypedMessage::user_decrypt(&pk, &[contract()], 31337, kms(), window);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["primaryType"], EIP712_PRIMARY_TYPE);
        assert_eq!(json["domain"]["chainId"], 31337);
        assert_eq!(json["message"]["durationDays"], 365);
        assert_eq!(
            json["message"]["contractAddresses"][0],
            contract().to_checksum_string()
        );
        assert_eq!(msg.public_key().unwrap(), pk);
        assert_eq!(msg.window(), window);
    }

    #[test]
    fn test_artifact_expiry() {
        let pk = PublicKey::from_bytes(&[7u8; 32]).unwrap();
        let window = AuthorizationWindow::with_default_duration(100);
        let artifact =
            AuthorizationArtifact::new(TypedMessage::user_decrypt(&pk, &[contract()], 1, kms(), window));
        assert_eq!(artifact.duration_seconds(), 31_536_000);
        assert_eq!(artifact.expires_at(), 100 + 31_536_000);
        assert!(artifact.is_valid_at(100));
        assert!(!artifact.is_valid_at(artifact.expires_at()));
        assert_eq!(artifact.contracts(), &[contract()]);
    }

    #[test]
    fn test_signature_parsing() {
        let sig = WalletSignature::from_bytes(&[1u8; SIGNATURE_SIZE]).unwrap();
        assert_eq!(WalletSignature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert!(matches!(
            WalletSignature::from_hex("0x1234"),
            Err(HushError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_request_pairs_handles_with_contract() {
        let handle = CiphertextHandle::from_bytes(&[9u8; 32]).unwrap();
        let sig = WalletSignature::from_bytes(&[1u8; SIGNATURE_SIZE]).unwrap();
        let request = DecryptionRequest::for_contract(
            contract(),
            kms(),
            sig,
            &[handle, handle],
            AuthorizationWindow::with_default_duration(0),
        );
        assert_eq!(request.handles.len(), 2);
        assert!(request.handles.iter().all(|r| r.contract_address == contract()));
        assert_eq!(request.contract_addresses, vec![contract()]);
    }
}
