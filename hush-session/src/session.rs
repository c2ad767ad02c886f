//! Session façade.
//!
//! [`HushSession`] wires one lifecycle controller, one keypair store and the
//! three operation components together so that they always agree on the
//! active engine and the stored keypair.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use hush_core::error::Result;
use hush_core::traits::{EngineFactory, KeypairStorage, NetworkParameterSource};
use hush_core::types::{
    AuthorizationArtifact, AuthorizationWindow, DecryptedValues, EncryptedInput, Keypair,
    WalletSignature,
};
use hush_keystore::KeypairStore;
use hush_relayer::RelayerClient;

use crate::authorization::AuthorizationBuilder;
use crate::config::SessionConfig;
use crate::decryption::{AggregateResult, DecryptionRequester};
use crate::encryptor::InputEncryptor;
use crate::lifecycle::{EngineHandle, LifecycleController, LifecycleState, Readiness};

/// Client-side coordinator for one user.
#[derive(Debug)]
pub struct HushSession {
    config: SessionConfig,
    lifecycle: Arc<LifecycleController>,
    keystore: Arc<KeypairStore>,
    encryptor: InputEncryptor,
    authorization: AuthorizationBuilder,
    decryption: DecryptionRequester,
}

impl HushSession {
    /// Creates an idle session.
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn NetworkParameterSource>,
        factory: Arc<dyn EngineFactory>,
        storage: Arc<dyn KeypairStorage>,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleController::new(&config, source, factory));
        let keystore = Arc::new(KeypairStore::with_key(storage, config.keypair_storage_key.clone()));
        let days = config.authorization_duration_days;

        info!(
            rpc_url = %config.rpc_url,
            chain_id = config.supported_chain_id,
            "Created session"
        );

        Self {
            encryptor: InputEncryptor::new(lifecycle.clone()),
            authorization: AuthorizationBuilder::new(lifecycle.clone(), keystore.clone(), days),
            decryption: DecryptionRequester::new(lifecycle.clone(), keystore.clone(), days),
            config,
            lifecycle,
            keystore,
        }
    }

    /// Creates a session that resolves parameters from the relayer at
    /// `config.rpc_url`.
    pub fn with_relayer(
        config: SessionConfig,
        factory: Arc<dyn EngineFactory>,
        storage: Arc<dyn KeypairStorage>,
    ) -> Result<Self> {
        let relayer = RelayerClient::with_config(config.relayer_config())?;
        Ok(Self::new(config, Arc::new(relayer), factory, storage))
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared lifecycle controller.
    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK
    // ═══════════════════════════════════════════════════════════════════════════

    /// See [`LifecycleController::set_network`].
    pub async fn set_network(&self, chain_id: Option<u64>) -> Readiness {
        self.lifecycle.set_network(chain_id).await
    }

    /// Drops the engine and returns to `Idle`.
    pub fn teardown(&self) {
        self.lifecycle.teardown();
    }

    /// Current `(ready, loading, error)` triple.
    pub fn readiness(&self) -> Readiness {
        self.lifecycle.readiness()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Receives every published lifecycle state.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// The active engine, or `EngineNotReady`.
    pub fn engine(&self) -> Result<EngineHandle> {
        self.lifecycle.engine()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// See [`InputEncryptor::encrypt`].
    pub async fn encrypt(&self, contract: &str, user: &str, value: i64) -> Result<EncryptedInput> {
        self.encryptor.encrypt(contract, user, value).await
    }

    /// See [`InputEncryptor::encrypt_values`].
    pub async fn encrypt_values(&self, contract: &str, user: &str, values: &[i64]) -> Result<EncryptedInput> {
        self.encryptor.encrypt_values(contract, user, values).await
    }

    /// See [`AuthorizationBuilder::build_authorization`].
    pub async fn build_authorization(&self, contract: &str) -> Result<AuthorizationArtifact> {
        self.authorization.build_authorization(contract).await
    }

    /// See [`AuthorizationBuilder::build_authorization_at`].
    pub async fn build_authorization_at(&self, contract: &str, start_timestamp: u64) -> Result<AuthorizationArtifact> {
        self.authorization.build_authorization_at(contract, start_timestamp).await
    }

    /// See [`DecryptionRequester::request_decryption`].
    pub async fn request_decryption(
        &self,
        contract: &str,
        user: &str,
        signature: WalletSignature,
        handles: &[&str],
        start_timestamp: Option<u64>,
        duration_days: Option<u32>,
    ) -> Result<DecryptedValues> {
        self.decryption
            .request_decryption(contract, user, signature, handles, start_timestamp, duration_days)
            .await
    }

    /// See [`DecryptionRequester::request_with_artifact`].
    pub async fn request_with_artifact(
        &self,
        artifact: &AuthorizationArtifact,
        user: &str,
        signature: WalletSignature,
        handles: &[&str],
    ) -> Result<DecryptedValues> {
        self.decryption
            .request_with_artifact(artifact, user, signature, handles)
            .await
    }

    /// See [`DecryptionRequester::decrypt_aggregate`].
    pub async fn decrypt_aggregate(
        &self,
        contract: &str,
        user: &str,
        signature: WalletSignature,
        total_handle: &str,
        count_handle: &str,
        window: AuthorizationWindow,
    ) -> Result<AggregateResult> {
        self.decryption
            .decrypt_aggregate(contract, user, signature, total_handle, count_handle, window)
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // KEYPAIR
    // ═══════════════════════════════════════════════════════════════════════════

    /// Loads the stored keypair, generating one with the active engine if
    /// none exists.
    pub async fn ensure_keypair(&self) -> Result<Keypair> {
        let handle = self.lifecycle.engine()?;
        self.keystore.ensure_keypair(handle.engine()).await
    }

    /// The stored keypair, if any.
    pub async fn current_keypair(&self) -> Result<Option<Keypair>> {
        self.keystore.current().await
    }

    /// Deletes the stored keypair. Artifacts naming it stop verifying.
    pub async fn clear_keypair(&self) -> Result<bool> {
        self.keystore.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_core::constants::RELAYER_METADATA_METHOD;
    use hush_core::error::HushError;
    use hush_core::traits::TypedDataSigner;
    use hush_core::types::{AccountAddress, CiphertextHandle};
    use hush_engine::{LocalWallet, MockCoprocessor, MockEngineFactory};
    use hush_keystore::MemoryKeyStorage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::testing::{params, StaticSource, CONTRACT};

    async fn relayer() -> MockServer {
        let server = MockServer::start().await;
        let p = params();
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": RELAYER_METADATA_METHOD })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "ACLAddress": p.acl_address.to_hex(),
                    "InputVerifierAddress": p.input_verifier_address.to_hex(),
                    "KMSVerifierAddress": p.kms_verifier_address.to_hex(),
                }
            })))
            .mount(&server)
            .await;
        server
    }

    fn session_with(source: Arc<dyn NetworkParameterSource>, storage: Arc<dyn KeypairStorage>) -> (HushSession, Arc<MockCoprocessor>) {
        let coprocessor = MockCoprocessor::shared(31337, params());
        let factory = Arc::new(MockEngineFactory::new(coprocessor.clone()));
        let session = HushSession::new(SessionConfig::default(), source, factory, storage);
        (session, coprocessor)
    }

    #[tokio::test]
    async fn test_end_to_end_through_relayer() {
        let server = relayer().await;
        let coprocessor = MockCoprocessor::shared(31337, params());
        let session = HushSession::with_relayer(
            SessionConfig::default().with_rpc_url(server.uri()),
            Arc::new(MockEngineFactory::new(coprocessor.clone())),
            Arc::new(MemoryKeyStorage::new()),
        )
        .unwrap();

        let readiness = session.set_network(Some(31337)).await;
        assert!(readiness.ready && !readiness.loading && readiness.error.is_none());
        assert_eq!(session.engine().unwrap().parameters(), &params());

        let wallet = LocalWallet::random();
        let user = wallet.address().to_hex();
        let input = session.encrypt(CONTRACT, &user, 7).await.unwrap();
        assert_eq!(input.len(), 2);
        coprocessor
            .verify_input(&input, AccountAddress::from_hex(CONTRACT).unwrap(), wallet.address())
            .unwrap();

        let artifact = session.build_authorization(CONTRACT).await.unwrap();
        assert_eq!(artifact.duration_seconds(), 365 * 86_400);
        let signature = wallet.sign_typed_message(&artifact.typed_message).await.unwrap();

        let handles: Vec<String> = input.handles.iter().map(CiphertextHandle::to_hex).collect();
        let refs: Vec<&str> = handles.iter().map(String::as_str).collect();
        let values = session
            .request_with_artifact(&artifact, &user, signature, &refs)
            .await
            .unwrap();

        assert_eq!(values[&input.handles[0]], 7);
        assert_eq!(values[&input.handles[1]], 1);
    }

    #[tokio::test]
    async fn test_unreachable_relayer_fails_lifecycle() {
        let session = HushSession::with_relayer(
            SessionConfig::default().with_rpc_url("http://127.0.0.1:1"),
            Arc::new(MockEngineFactory::new(MockCoprocessor::shared(31337, params()))),
            Arc::new(MemoryKeyStorage::new()),
        )
        .unwrap();

        let readiness = session.set_network(Some(31337)).await;
        assert!(!readiness.ready && !readiness.loading);
        assert!(matches!(
            readiness.error.as_deref(),
            Some(HushError::UnreachableEndpoint { .. })
        ));
        assert!(matches!(
            session.encrypt(CONTRACT, CONTRACT, 1).await,
            Err(HushError::EngineNotReady)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_chain_stays_idle() {
        let (session, _) = session_with(Arc::new(StaticSource(params())), Arc::new(MemoryKeyStorage::new()));

        let readiness = session.set_network(Some(1)).await;
        assert!(!readiness.ready && !readiness.loading && readiness.error.is_none());
        assert!(matches!(session.state(), LifecycleState::Idle));
    }

    #[tokio::test]
    async fn test_invalid_rpc_url_rejected() {
        let result = HushSession::with_relayer(
            SessionConfig::default().with_rpc_url("not a url"),
            Arc::new(MockEngineFactory::new(MockCoprocessor::shared(31337, params()))),
            Arc::new(MemoryKeyStorage::new()),
        );
        assert!(matches!(result, Err(HushError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_keypair_survives_network_switch() {
        let (session, _) = session_with(Arc::new(StaticSource(params())), Arc::new(MemoryKeyStorage::new()));

        session.set_network(Some(31337)).await;
        let first = session.ensure_keypair().await.unwrap();

        session.set_network(None).await;
        assert!(matches!(session.ensure_keypair().await, Err(HushError::EngineNotReady)));
        assert_eq!(session.current_keypair().await.unwrap(), Some(first.clone()));

        session.set_network(Some(31337)).await;
        assert_eq!(session.ensure_keypair().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_sessions_sharing_storage_share_keypair() {
        let storage: Arc<dyn KeypairStorage> = Arc::new(MemoryKeyStorage::new());
        let (a, _) = session_with(Arc::new(StaticSource(params())), storage.clone());
        let (b, _) = session_with(Arc::new(StaticSource(params())), storage);
        futures::join!(a.set_network(Some(31337)), b.set_network(Some(31337)));

        let (ka, kb) = futures::join!(a.ensure_keypair(), b.ensure_keypair());
        let ka = ka.unwrap();
        assert_eq!(kb.unwrap(), ka);

        // An artifact built by one session names the key the other decrypts with.
        let artifact = a.build_authorization(CONTRACT).await.unwrap();
        assert_eq!(artifact.typed_message.public_key().unwrap(), ka.public_key);
        assert_eq!(b.current_keypair().await.unwrap(), Some(ka));
    }

    #[tokio::test]
    async fn test_clear_keypair_regenerates() {
        let (session, _) = session_with(Arc::new(StaticSource(params())), Arc::new(MemoryKeyStorage::new()));
        session.set_network(Some(31337)).await;

        let first = session.ensure_keypair().await.unwrap();
        assert!(session.clear_keypair().await.unwrap());
        assert_eq!(session.current_keypair().await.unwrap(), None);
        assert_ne!(session.ensure_keypair().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_subscribers_observe_ready() {
        let (session, _) = session_with(Arc::new(StaticSource(params())), Arc::new(MemoryKeyStorage::new()));
        let mut rx = session.subscribe();

        session.set_network(Some(31337)).await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().readiness().ready);

        session.teardown();
        rx.changed().await.unwrap();
        assert!(matches!(*rx.borrow(), LifecycleState::Idle));
    }
}
