//! Authorization builder.

use std::sync::Arc;

use tracing::{debug, instrument};

use hush_core::error::Result;
use hush_core::types::{unix_now, AccountAddress, AuthorizationArtifact, AuthorizationWindow};
use hush_keystore::KeypairStore;

use crate::lifecycle::LifecycleController;

/// Builds unsigned decryption authorizations scoped to one contract.
///
/// The artifact names the client's public key, so the keypair is ensured
/// first. Signing is left to the caller's wallet.
#[derive(Debug)]
pub struct AuthorizationBuilder {
    lifecycle: Arc<LifecycleController>,
    keystore: Arc<KeypairStore>,
    duration_days: u32,
}

impl AuthorizationBuilder {
    /// Creates a builder issuing windows of `duration_days`.
    pub fn new(lifecycle: Arc<LifecycleController>, keystore: Arc<KeypairStore>, duration_days: u32) -> Self {
        Self {
            lifecycle,
            keystore,
            duration_days,
        }
    }

    /// Validity of issued windows, in days.
    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Builds an authorization whose window starts now.
    pub async fn build_authorization(&self, contract: &str) -> Result<AuthorizationArtifact> {
        self.build_authorization_at(contract, unix_now()).await
    }

    /// Builds an authorization whose window starts at `start_timestamp`.
    ///
    /// Deterministic: the same keypair, contract, start and duration give a
    /// byte-identical typed message.
    #[instrument(skip(self))]
    pub async fn build_authorization_at(&self, contract: &str, start_timestamp: u64) -> Result<AuthorizationArtifact> {
        let handle = self.lifecycle.engine()?;
        let contract = AccountAddress::from_hex(contract)?;

        let keypair = self.keystore.ensure_keypair(handle.engine()).await?;
        let window = AuthorizationWindow::new(start_timestamp, self.duration_days);
        let message = handle
            .engine()
            .create_authorization_message(&keypair.public_key, &[contract], window)?;
        self.lifecycle.ensure_current(&handle)?;

        debug!(chain_id = handle.chain_id(), expires_at = window.end_timestamp(), "Built authorization");
        Ok(AuthorizationArtifact::new(message))
    }
}
