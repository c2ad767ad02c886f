//! Decryption requester.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use hush_core::error::{HushError, Result};
use hush_core::types::{
    unix_now, AccountAddress, AuthorizationArtifact, AuthorizationWindow, CiphertextHandle,
    DecryptedValues, DecryptionRequest, PublicKey, WalletSignature,
};
use hush_keystore::KeypairStore;

use crate::lifecycle::LifecycleController;

/// Plaintext `(total, count)` pair read back from an aggregating contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Sum of submitted values
    pub total: u64,
    /// Number of submissions
    pub count: u64,
}

impl AggregateResult {
    /// Mean of the submissions, or `None` before the first one.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total as f64 / self.count as f64)
        }
    }
}

/// Exchanges a signed authorization for the plaintexts of contract handles.
#[derive(Debug)]
pub struct DecryptionRequester {
    lifecycle: Arc<LifecycleController>,
    keystore: Arc<KeypairStore>,
    duration_days: u32,
}

impl DecryptionRequester {
    /// Creates a requester; `duration_days` is the window assumed when the
    /// caller supplies none.
    pub fn new(lifecycle: Arc<LifecycleController>, keystore: Arc<KeypairStore>, duration_days: u32) -> Self {
        Self {
            lifecycle,
            keystore,
            duration_days,
        }
    }

    /// Decrypts `handles` exposed by `contract` on behalf of `user`.
    ///
    /// `signature` must cover exactly the `[contract]`, `user` and window
    /// sent here. An omitted `start_timestamp` defaults to now and an omitted
    /// `duration_days` to the configured duration, each independently. A
    /// defaulted start only verifies if the authorization was built in the
    /// same second; prefer [`Self::request_with_artifact`].
    pub async fn request_decryption(
        &self,
        contract: &str,
        user: &str,
        signature: WalletSignature,
        handles: &[&str],
        start_timestamp: Option<u64>,
        duration_days: Option<u32>,
    ) -> Result<DecryptedValues> {
        let contract = AccountAddress::from_hex(contract)?;
        let window = AuthorizationWindow::new(
            start_timestamp.unwrap_or_else(unix_now),
            duration_days.unwrap_or(self.duration_days),
        );
        self.decrypt(contract, user, signature, handles, window, None).await
    }

    /// Decrypts `handles` under the exact window and contract of `artifact`.
    ///
    /// Fails with `UnauthorizedSignature` if the artifact names a public key
    /// other than the stored one (e.g. after the keypair was cleared).
    pub async fn request_with_artifact(
        &self,
        artifact: &AuthorizationArtifact,
        user: &str,
        signature: WalletSignature,
        handles: &[&str],
    ) -> Result<DecryptedValues> {
        let contract = match artifact.contracts() {
            [contract] => *contract,
            other => {
                return Err(HushError::InvalidAddress(format!(
                    "authorization must name exactly one contract, found {}",
                    other.len()
                )))
            }
        };
        let public_key = artifact.typed_message.public_key()?;
        self.decrypt(contract, user, signature, handles, artifact.window, Some(public_key))
            .await
    }

    /// Decrypts a `(total, count)` handle pair under `window`, which must
    /// be the one the signature was produced for.
    pub async fn decrypt_aggregate(
        &self,
        contract: &str,
        user: &str,
        signature: WalletSignature,
        total_handle: &str,
        count_handle: &str,
        window: AuthorizationWindow,
    ) -> Result<AggregateResult> {
        let total = CiphertextHandle::from_hex(total_handle)?;
        let count = CiphertextHandle::from_hex(count_handle)?;
        let values = self
            .request_decryption(
                contract,
                user,
                signature,
                &[total_handle, count_handle],
                Some(window.start_timestamp),
                Some(window.duration_days),
            )
            .await?;

        let read = |handle: &CiphertextHandle| {
            values
                .get(handle)
                .copied()
                .ok_or_else(|| HushError::UnknownHandle(handle.to_hex()))
        };
        Ok(AggregateResult {
            total: read(&total)?,
            count: read(&count)?,
        })
    }

    #[instrument(skip(self, signature, handles, expected_key), fields(handles = handles.len()))]
    async fn decrypt(
        &self,
        contract: AccountAddress,
        user: &str,
        signature: WalletSignature,
        handles: &[&str],
        window: AuthorizationWindow,
        expected_key: Option<PublicKey>,
    ) -> Result<DecryptedValues> {
        let engine = self.lifecycle.engine()?;
        let user = AccountAddress::from_hex(user)?;
        let handles = handles
            .iter()
            .map(|h| CiphertextHandle::from_hex(h))
            .collect::<Result<Vec<_>>>()?;

        let keypair = self.keystore.ensure_keypair(engine.engine()).await?;
        if let Some(expected) = expected_key {
            if expected != keypair.public_key {
                return Err(HushError::UnauthorizedSignature(
                    "authorization was issued for a different keypair".into(),
                ));
            }
        }

        let request = DecryptionRequest::for_contract(contract, user, signature, &handles, window);
        let values = engine.engine().decrypt(&request, &keypair).await?;

        if let Err(stale) = self.lifecycle.ensure_current(&engine) {
            warn!(chain_id = engine.chain_id(), "Discarding decryption from superseded network");
            return Err(stale);
        }

        debug!(chain_id = engine.chain_id(), values = values.len(), "Decryption complete");
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hush_core::traits::{EncryptionEngine, EngineFactory, TypedDataSigner};
    use hush_core::types::{EncryptedInput, Keypair, NetworkParameters, TypedMessage};
    use hush_engine::{LocalWallet, MockCoprocessor, MockEngine};
    use hush_keystore::MemoryKeyStorage;
    use test_case::test_case;
    use tokio::sync::Notify;

    use crate::authorization::AuthorizationBuilder;
    use crate::encryptor::InputEncryptor;
    use crate::testing::{idle_lifecycle, lifecycle_with, params, ready_lifecycle, CONTRACT};

    struct Fixture {
        lifecycle: Arc<LifecycleController>,
        coprocessor: Arc<MockCoprocessor>,
        builder: AuthorizationBuilder,
        requester: DecryptionRequester,
        wallet: LocalWallet,
        user: String,
    }

    impl Fixture {
        fn new(lifecycle: Arc<LifecycleController>, coprocessor: Arc<MockCoprocessor>) -> Self {
            let keystore = Arc::new(KeypairStore::new(Arc::new(MemoryKeyStorage::new())));
            let wallet = LocalWallet::random();
            Self {
                builder: AuthorizationBuilder::new(lifecycle.clone(), keystore.clone(), 365),
                requester: DecryptionRequester::new(lifecycle.clone(), keystore, 365),
                user: wallet.address().to_hex(),
                wallet,
                lifecycle,
                coprocessor,
            }
        }

        async fn ready() -> Self {
            let (lifecycle, coprocessor) = ready_lifecycle().await;
            Self::new(lifecycle, coprocessor)
        }

        /// Encrypts and submits `value`, returning the handle texts.
        async fn submit(&self, value: i64) -> Vec<String> {
            let input = InputEncryptor::new(self.lifecycle.clone())
                .encrypt(CONTRACT, &self.user, value)
                .await
                .unwrap();
            self.coprocessor
                .verify_input(
                    &input,
                    AccountAddress::from_hex(CONTRACT).unwrap(),
                    self.wallet.address(),
                )
                .unwrap();
            input.handles.iter().map(|h| h.to_hex()).collect()
        }

        async fn authorize(&self) -> (AuthorizationArtifact, WalletSignature) {
            let artifact = self.builder.build_authorization(CONTRACT).await.unwrap();
            let signature = self.wallet.sign_typed_message(&artifact.typed_message).await.unwrap();
            (artifact, signature)
        }
    }

    fn refs(handles: &[String]) -> Vec<&str> {
        handles.iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_decrypts_submitted_values() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(7).await;
        let (artifact, signature) = fx.authorize().await;

        let values = fx
            .requester
            .request_with_artifact(&artifact, &fx.user, signature, &refs(&handles))
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[&CiphertextHandle::from_hex(&handles[0]).unwrap()], 7);
        assert_eq!(values[&CiphertextHandle::from_hex(&handles[1]).unwrap()], 1);
    }

    #[tokio::test]
    async fn test_explicit_window_matches_artifact() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(3).await;
        let (artifact, signature) = fx.authorize().await;

        let values = fx
            .requester
            .request_decryption(
                CONTRACT,
                &fx.user,
                signature,
                &refs(&handles),
                Some(artifact.start_timestamp()),
                Some(365),
            )
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn test_start_only_takes_default_duration() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(4).await;
        let (artifact, signature) = fx.authorize().await;

        let values = fx
            .requester
            .request_decryption(
                CONTRACT,
                &fx.user,
                signature,
                &refs(&handles),
                Some(artifact.start_timestamp()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(values[&CiphertextHandle::from_hex(&handles[0]).unwrap()], 4);
    }

    #[tokio::test]
    async fn test_mismatched_duration_is_unauthorized() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(4).await;
        let (artifact, signature) = fx.authorize().await;

        assert!(matches!(
            fx.requester
                .request_decryption(
                    CONTRACT,
                    &fx.user,
                    signature,
                    &refs(&handles),
                    Some(artifact.start_timestamp()),
                    Some(30),
                )
                .await,
            Err(HushError::UnauthorizedSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_window_is_unauthorized() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(7).await;
        let (artifact, signature) = fx.authorize().await;

        let shifted = AuthorizationWindow::new(artifact.start_timestamp() - 1, 365);
        assert!(matches!(
            fx.requester
                .request_decryption(
                    CONTRACT,
                    &fx.user,
                    signature,
                    &refs(&handles),
                    Some(shifted.start_timestamp),
                    Some(shifted.duration_days),
                )
                .await,
            Err(HushError::UnauthorizedSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_other_signer_is_unauthorized() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(7).await;
        let (artifact, _) = fx.authorize().await;
        let forged = LocalWallet::random().sign(&artifact.typed_message).unwrap();

        assert!(matches!(
            fx.requester
                .request_with_artifact(&artifact, &fx.user, forged, &refs(&handles))
                .await,
            Err(HushError::UnauthorizedSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let fx = Fixture::ready().await;
        let (artifact, signature) = fx.authorize().await;
        let never_submitted = format!("0x{}", "ab".repeat(32));

        assert!(matches!(
            fx.requester
                .request_with_artifact(&artifact, &fx.user, signature, &[never_submitted.as_str()])
                .await,
            Err(HushError::UnknownHandle(_))
        ));
    }

    #[test_case("0x1234" ; "too short")]
    #[test_case("not-a-handle" ; "not hex")]
    #[tokio::test]
    async fn test_invalid_handle_text(handle: &str) {
        let fx = Fixture::ready().await;
        let (artifact, signature) = fx.authorize().await;

        assert!(matches!(
            fx.requester
                .request_with_artifact(&artifact, &fx.user, signature, &[handle])
                .await,
            Err(HushError::InvalidHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_not_ready_without_engine() {
        let (lifecycle, coprocessor) = idle_lifecycle();
        let fx = Fixture::new(lifecycle, coprocessor);
        let signature = WalletSignature::from_bytes(&[0u8; 65]).unwrap();

        assert!(matches!(
            fx.requester
                .request_decryption(CONTRACT, &fx.user, signature, &[], None, None)
                .await,
            Err(HushError::EngineNotReady)
        ));
    }

    #[tokio::test]
    async fn test_cleared_keypair_invalidates_artifact() {
        let fx = Fixture::ready().await;
        let handles = fx.submit(7).await;
        let (artifact, signature) = fx.authorize().await;

        fx.requester.keystore.clear().await.unwrap();
        assert!(matches!(
            fx.requester
                .request_with_artifact(&artifact, &fx.user, signature, &refs(&handles))
                .await,
            Err(HushError::UnauthorizedSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_aggregate() {
        let fx = Fixture::ready().await;
        let first = fx.submit(7).await;
        let second = fx.submit(3).await;
        let (artifact, signature) = fx.authorize().await;

        // The contract folds submissions into (total, count) and shares them with the user.
        let contract = AccountAddress::from_hex(CONTRACT).unwrap();
        let h = |s: &String| CiphertextHandle::from_hex(s).unwrap();
        let total = fx.coprocessor.add(&h(&first[0]), &h(&second[0]), contract).unwrap();
        let count = fx.coprocessor.add(&h(&first[1]), &h(&second[1]), contract).unwrap();
        fx.coprocessor.allow(total, fx.wallet.address()).unwrap();
        fx.coprocessor.allow(count, fx.wallet.address()).unwrap();

        let result = fx
            .requester
            .decrypt_aggregate(
                CONTRACT,
                &fx.user,
                signature,
                &total.to_hex(),
                &count.to_hex(),
                artifact.window,
            )
            .await
            .unwrap();

        assert_eq!(result, AggregateResult { total: 10, count: 2 });
        assert_eq!(result.average(), Some(5.0));
    }

    #[test_case(0, 0, None ; "no submissions")]
    #[test_case(21, 3, Some(7.0) ; "whole")]
    #[test_case(7, 2, Some(3.5) ; "fractional")]
    fn test_average(total: u64, count: u64, expected: Option<f64>) {
        assert_eq!(AggregateResult { total, count }.average(), expected);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK SWITCH DURING DECRYPTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mock engine whose decrypt waits until released.
    struct GatedEngine {
        inner: MockEngine,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl EncryptionEngine for GatedEngine {
        fn chain_id(&self) -> u64 {
            self.inner.chain_id()
        }

        fn network_parameters(&self) -> &NetworkParameters {
            self.inner.network_parameters()
        }

        async fn encrypt_input(
            &self,
            contract: AccountAddress,
            user: AccountAddress,
            values: &[u32],
        ) -> Result<EncryptedInput> {
            self.inner.encrypt_input(contract, user, values).await
        }

        fn create_authorization_message(
            &self,
            public_key: &PublicKey,
            contracts: &[AccountAddress],
            window: AuthorizationWindow,
        ) -> Result<TypedMessage> {
            self.inner.create_authorization_message(public_key, contracts, window)
        }

        fn generate_keypair(&self) -> Result<Keypair> {
            self.inner.generate_keypair()
        }

        async fn decrypt(&self, request: &DecryptionRequest, keypair: &Keypair) -> Result<DecryptedValues> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.decrypt(request, keypair).await
        }
    }

    struct GatedFactory {
        coprocessor: Arc<MockCoprocessor>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl EngineFactory for GatedFactory {
        async fn create(&self, _chain_id: u64, _parameters: NetworkParameters) -> Result<Arc<dyn EncryptionEngine>> {
            Ok(Arc::new(GatedEngine {
                inner: MockEngine::new(self.coprocessor.clone()),
                entered: self.entered.clone(),
                release: self.release.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_result_discarded_after_network_switch() {
        let coprocessor = MockCoprocessor::shared(31337, params());
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let lifecycle = lifecycle_with(Arc::new(GatedFactory {
            coprocessor: coprocessor.clone(),
            entered: entered.clone(),
            release: release.clone(),
        }));
        lifecycle.set_network(Some(31337)).await;

        let fx = Arc::new(Fixture::new(lifecycle.clone(), coprocessor));
        let handles = fx.submit(7).await;
        let (artifact, signature) = fx.authorize().await;

        let request = {
            let fx = fx.clone();
            tokio::spawn(async move {
                fx.requester
                    .request_with_artifact(&artifact, &fx.user, signature, &refs(&handles))
                    .await
            })
        };

        entered.notified().await;
        lifecycle.set_network(Some(1)).await;
        release.notify_one();

        assert!(matches!(
            request.await.unwrap(),
            Err(HushError::StaleNetwork { .. })
        ));
    }
}
