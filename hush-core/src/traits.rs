//! Capability traits for HUSH.
//!
//! These traits define the seams between the coordinator and its
//! collaborators, enabling substitution and testing:
//!
//! - the relayer metadata side channel
//! - the opaque encryption engine and its factory
//! - durable keypair storage
//! - the wallet signing boundary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    AccountAddress, AuthorizationWindow, DecryptedValues, DecryptionRequest, EncryptedInput,
    Keypair, NetworkParameters, PublicKey, TypedMessage, WalletSignature,
};

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the network's cryptographic public parameters.
#[async_trait]
pub trait NetworkParameterSource: Send + Sync {
    /// Fetches the parameters advertised by `rpc_url`.
    ///
    /// Implementations do not retry.
    async fn fetch_parameters(&self, rpc_url: &str) -> Result<NetworkParameters>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCRYPTION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Network-scoped encryption capability.
///
/// The homomorphic scheme itself is opaque; any library exposing this
/// operation set is substitutable.
#[async_trait]
pub trait EncryptionEngine: Send + Sync {
    /// Chain this engine was constructed for.
    fn chain_id(&self) -> u64;

    /// Parameters this engine was constructed from. Fixed for its lifetime.
    fn network_parameters(&self) -> &NetworkParameters;

    /// Encrypts 32-bit fields bound to `(contract, user)`.
    async fn encrypt_input(
        &self,
        contract: AccountAddress,
        user: AccountAddress,
        values: &[u32],
    ) -> Result<EncryptedInput>;

    /// Builds the EIP-712 document authorizing `public_key` to decrypt values
    /// of `contracts` during `window`.
    fn create_authorization_message(
        &self,
        public_key: &PublicKey,
        contracts: &[AccountAddress],
        window: AuthorizationWindow,
    ) -> Result<TypedMessage>;

    /// Generates a fresh decryption keypair.
    fn generate_keypair(&self) -> Result<Keypair>;

    /// Requests the plaintexts of `request.handles`, unsealing them with `keypair`.
    async fn decrypt(&self, request: &DecryptionRequest, keypair: &Keypair)
        -> Result<DecryptedValues>;
}

/// Constructs engines from resolved network parameters.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Creates an engine scoped to `(chain_id, parameters)`.
    async fn create(
        &self,
        chain_id: u64,
        parameters: NetworkParameters,
    ) -> Result<Arc<dyn EncryptionEngine>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY STORAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Durable key-value storage for the client keypair.
///
/// Implementations might use:
/// - In-memory storage (for testing)
/// - A JSON file in the user's profile directory
/// - An OS keychain
#[async_trait]
pub trait KeypairStorage: Send + Sync {
    /// Reads the keypair stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Keypair>>;

    /// Writes `keypair` under `key`, replacing any previous value.
    async fn store(&self, key: &str, keypair: &Keypair) -> Result<()>;

    /// Deletes the entry under `key`. Returns true if one existed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Returns the keypair under `key`, first storing the output of
    /// `generate` if the entry is absent.
    ///
    /// Atomic per key across every handle on the same backing store:
    /// concurrent callers all receive the one keypair that was persisted, and
    /// `generate` is never called while an entry exists.
    async fn load_or_insert_with(
        &self,
        key: &str,
        generate: &(dyn Fn() -> Result<Keypair> + Send + Sync),
    ) -> Result<Keypair>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET
// ═══════════════════════════════════════════════════════════════════════════════

/// Wallet signing boundary.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// Address whose key produces the signatures.
    fn address(&self) -> AccountAddress;

    /// Signs an EIP-712 document.
    async fn sign_typed_message(&self, message: &TypedMessage) -> Result<WalletSignature>;
}
