//! Error types for HUSH.
//!
//! This module provides the error hierarchy using `thiserror`.
//! Every variant maps onto one [`ErrorCategory`] so callers can branch on the
//! kind of failure without matching every variant.

use thiserror::Error;

/// Result type alias using `HushError`.
pub type Result<T> = std::result::Result<T, HushError>;

/// Coarse classification of [`HushError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The relayer endpoint could not be reached.
    Transport,
    /// Malformed input or malformed data received from a peer.
    Protocol,
    /// Operation invoked in the wrong lifecycle state.
    State,
    /// Signature, window or contract scope mismatch.
    Authorization,
    /// Handle not decryptable by this requester.
    UnknownHandle,
    /// Local persistence failed.
    Storage,
    /// Misconfiguration or broken invariant.
    Internal,
}

/// Main error type for all HUSH operations.
#[derive(Debug, Error)]
pub enum HushError {
    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSPORT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The side-channel RPC call did not succeed.
    #[error("Relayer endpoint unreachable at {url}: {reason}")]
    UnreachableEndpoint { url: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // PROTOCOL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Relayer metadata response is missing fields or is not decodable.
    #[error("Malformed relayer metadata: {0}")]
    MalformedMetadata(String),

    /// Not a well-formed 20-byte account address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Value does not fit the declared bit width.
    #[error("Value {value} out of range for {bits}-bit encrypted integer")]
    ValueOutOfRange { value: i64, bits: u32 },

    /// Not a well-formed ciphertext handle.
    #[error("Invalid ciphertext handle: {0}")]
    InvalidHandle(String),

    /// Not a well-formed wallet signature.
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// The chain-side input verifier rejected an encrypted input.
    #[error("Encrypted input rejected: {0}")]
    InputRejected(String),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// No engine handle exists for the current network.
    #[error("Encryption engine not ready")]
    EngineNotReady,

    /// The network changed while the operation was in flight.
    #[error("Network changed during operation (generation {expected}, now {current})")]
    StaleNetwork { expected: u64, current: u64 },

    // ═══════════════════════════════════════════════════════════════════════════
    // AUTHORIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Signature does not verify against the stated window, contracts and user.
    #[error("Unauthorized signature: {0}")]
    UnauthorizedSignature(String),

    /// The authorization window does not cover the current time.
    #[error("Authorization window [{start}, {end}) does not cover {now}")]
    AuthorizationExpired { start: u64, end: u64, now: u64 },

    // ═══════════════════════════════════════════════════════════════════════════
    // HANDLE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle is unknown, not owned by the requester, or not shared with the contract.
    #[error("Handle not decryptable: {0}")]
    UnknownHandle(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Keypair storage is corrupted or unavailable.
    #[error("Key storage error: {0}")]
    KeyStorageError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The wallet failed to produce a signature.
    #[error("Signing failed: {0}")]
    SigningError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HushError {
    /// Returns the taxonomy bucket of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            HushError::UnreachableEndpoint { .. } => ErrorCategory::Transport,

            HushError::MalformedMetadata(_)
            | HushError::InvalidAddress(_)
            | HushError::ValueOutOfRange { .. }
            | HushError::InvalidHandle(_)
            | HushError::InvalidSignature(_)
            | HushError::InputRejected(_)
            | HushError::HexError(_) => ErrorCategory::Protocol,

            HushError::EngineNotReady | HushError::StaleNetwork { .. } => ErrorCategory::State,

            HushError::UnauthorizedSignature(_) | HushError::AuthorizationExpired { .. } => {
                ErrorCategory::Authorization
            }

            HushError::UnknownHandle(_) => ErrorCategory::UnknownHandle,

            HushError::IoError(_) | HushError::JsonError(_) | HushError::KeyStorageError(_) => {
                ErrorCategory::Storage
            }

            HushError::ConfigError(_) | HushError::SigningError(_) | HushError::InternalError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns true if a caller-level retry may succeed.
    ///
    /// The core never retries on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HushError::UnreachableEndpoint { .. } | HushError::StaleNetwork { .. }
        )
    }

    /// Returns true if this is an authorization failure.
    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }
}
