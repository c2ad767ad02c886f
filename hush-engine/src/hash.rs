//! Keccak256 hashing with domain separation.
//!
//! Every digest the mock engine derives is prefixed with a unique domain
//! separator and each input is length-prefixed:
//!
//! ```text
//! output = KECCAK256(len(domain) || domain || len(a) || a || len(b) || b ...)
//! ```

use sha3::{Digest, Keccak256};

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN SEPARATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle hash derivation.
pub const DOMAIN_HANDLE: &[u8] = b"HUSH_HANDLE_V1";

/// Binding of an encrypted input to `(chain, contract, user, handles)`.
pub const DOMAIN_INPUT_BINDING: &[u8] = b"HUSH_INPUT_BINDING_V1";

/// Public key derivation from the private key.
pub const DOMAIN_PUBLIC_KEY: &[u8] = b"HUSH_PUBLIC_KEY_V1";

/// Sealing pad for decrypted values.
pub const DOMAIN_SEAL: &[u8] = b"HUSH_SEAL_V1";

/// Handles produced by homomorphic operations.
pub const DOMAIN_COMPUTED: &[u8] = b"HUSH_COMPUTED_V1";

// ═══════════════════════════════════════════════════════════════════════════════
// KECCAK256
// ═══════════════════════════════════════════════════════════════════════════════

/// Plain Keccak256 (not SHA3-256; the padding differs).
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    Keccak256::digest(input).into()
}

/// Keccak256 over a domain separator and length-prefixed parts.
pub fn keccak256_multi(domain: &[u8], inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update((domain.len() as u32).to_le_bytes());
    hasher.update(domain);

    for input in inputs {
        hasher.update((input.len() as u64).to_le_bytes());
        hasher.update(input);
    }

    hasher.finalize().into()
}
