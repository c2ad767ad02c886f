//! Local secp256k1 wallet.
//!
//! Signs user decryption authorizations with an in-process key. Used by the
//! CLI demo and by tests; production callers plug in their own
//! [`TypedDataSigner`].

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use tracing::debug;

use hush_core::error::{HushError, Result};
use hush_core::traits::TypedDataSigner;
use hush_core::types::{AccountAddress, TypedMessage, WalletSignature};

use crate::eip712::{from_alloy_address, signing_hash};

/// A wallet holding its signing key in memory.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Creates a wallet with a freshly generated key.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Imports a wallet from a hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let signer = private_key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| HushError::SigningError(format!("invalid wallet key: {e}")))?;
        Ok(Self { signer })
    }

    /// Signs `message` synchronously.
    pub fn sign(&self, message: &TypedMessage) -> Result<WalletSignature> {
        let hash = signing_hash(message)?;
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| HushError::SigningError(e.to_string()))?;
        debug!(signer = %self.address(), "Signed decryption authorization");
        WalletSignature::from_bytes(&signature.as_bytes())
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalWallet({})", self.address())
    }
}

#[async_trait]
impl TypedDataSigner for LocalWallet {
    fn address(&self) -> AccountAddress {
        from_alloy_address(self.signer.address())
    }

    async fn sign_typed_message(&self, message: &TypedMessage) -> Result<WalletSignature> {
        self.sign(message)
    }
}
