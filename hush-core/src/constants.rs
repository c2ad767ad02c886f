//! Protocol constants for HUSH.
//!
//! Values that must agree with the development network's relayer and with the
//! EIP-712 schema used by the KMS when checking user decryption requests.

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK
// ═══════════════════════════════════════════════════════════════════════════════

/// The single supported development network (local Hardhat / anvil node).
pub const SUPPORTED_CHAIN_ID: u64 = 31337;

/// Default JSON-RPC endpoint of the development node.
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Reserved JSON-RPC method returning the relayer metadata.
pub const RELAYER_METADATA_METHOD: &str = "fhevm_relayer_metadata";

// ═══════════════════════════════════════════════════════════════════════════════
// SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an account address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Size of a ciphertext handle in bytes.
pub const HANDLE_SIZE: usize = 32;

/// Size of a recoverable secp256k1 wallet signature (`r || s || v`).
pub const SIGNATURE_SIZE: usize = 65;

/// Declared bit width of encrypted survey values.
pub const ENCRYPTED_VALUE_BITS: u32 = 32;

/// Auxiliary constant encrypted next to every submitted value (response counter).
pub const AUXILIARY_INCREMENT: u32 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLE LAYOUT
// ═══════════════════════════════════════════════════════════════════════════════
// hash[0..21] | index (1) | chain id (8, big endian) | fhe type (1) | version (1)

/// Number of leading hash bytes in a handle.
pub const HANDLE_HASH_LEN: usize = 21;

/// Offset of the field index byte.
pub const HANDLE_INDEX_OFFSET: usize = 21;

/// Offset of the big-endian chain id.
pub const HANDLE_CHAIN_ID_OFFSET: usize = 22;

/// Offset of the FHE type byte.
pub const HANDLE_TYPE_OFFSET: usize = 30;

/// Offset of the handle version byte.
pub const HANDLE_VERSION_OFFSET: usize = 31;

/// FHE type tag of an encrypted 32-bit unsigned integer.
pub const FHE_TYPE_EUINT32: u8 = 4;

/// Current handle layout version.
pub const HANDLE_VERSION: u8 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORIZATION POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Default validity of a decryption authorization, in days.
///
/// A policy parameter rather than a protocol invariant; see `SessionConfig`.
pub const DEFAULT_AUTHORIZATION_DAYS: u32 = 365;

/// Seconds per day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Default validity of a decryption authorization, in seconds (365 days).
pub const DEFAULT_AUTHORIZATION_SECONDS: u64 = DEFAULT_AUTHORIZATION_DAYS as u64 * SECONDS_PER_DAY;

/// EIP-712 domain name of user decryption authorizations.
pub const EIP712_DOMAIN_NAME: &str = "Decryption";

/// EIP-712 domain version of user decryption authorizations.
pub const EIP712_DOMAIN_VERSION: &str = "1";

/// EIP-712 primary type of user decryption authorizations.
pub const EIP712_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed storage key of the client keypair.
pub const KEYPAIR_STORAGE_KEY: &str = "fhevm-keypair";
