//! Keypair store: get-or-create over a storage backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use hush_core::constants::KEYPAIR_STORAGE_KEY;
use hush_core::error::Result;
use hush_core::traits::{EncryptionEngine, KeypairStorage};
use hush_core::types::Keypair;

/// Owns the client keypair's persistence.
///
/// The keypair is independent of the network: it survives network switches
/// and is only replaced after an explicit [`clear`](Self::clear). Any number
/// of stores may share one storage profile; the backend's
/// [`load_or_insert_with`](KeypairStorage::load_or_insert_with) keeps them on
/// a single keypair.
pub struct KeypairStore {
    storage: Arc<dyn KeypairStorage>,
    storage_key: String,
}

impl KeypairStore {
    /// Creates a store under the default storage key.
    pub fn new(storage: Arc<dyn KeypairStorage>) -> Self {
        Self::with_key(storage, KEYPAIR_STORAGE_KEY)
    }

    /// Creates a store under a custom storage key.
    pub fn with_key(storage: Arc<dyn KeypairStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
        }
    }

    /// The key entries are stored under.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Returns the persisted keypair, generating and persisting one with
    /// `engine` if none exists.
    ///
    /// Concurrent first callers, through this store or any other on the
    /// same storage, all receive the same persisted keypair.
    #[instrument(skip(self, engine), fields(key = %self.storage_key))]
    pub async fn ensure_keypair(&self, engine: &dyn EncryptionEngine) -> Result<Keypair> {
        let generated = AtomicBool::new(false);
        let keypair = self
            .storage
            .load_or_insert_with(&self.storage_key, &|| {
                generated.store(true, Ordering::Relaxed);
                engine.generate_keypair()
            })
            .await?;

        if generated.load(Ordering::Relaxed) {
            info!("Generated and stored new keypair");
        } else {
            debug!("Using stored keypair");
        }
        Ok(keypair)
    }

    /// Returns the persisted keypair without generating one.
    pub async fn current(&self) -> Result<Option<Keypair>> {
        self.storage.load(&self.storage_key).await
    }

    /// Deletes the persisted keypair. Returns true if one existed.
    ///
    /// Authorizations signed for the old public key stop being usable.
    #[instrument(skip(self), fields(key = %self.storage_key))]
    pub async fn clear(&self) -> Result<bool> {
        let removed = self.storage.remove(&self.storage_key).await?;
        if removed {
            info!("Cleared stored keypair");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for KeypairStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairStore")
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use hush_core::types::{
        AccountAddress, AuthorizationWindow, DecryptedValues, DecryptionRequest, EncryptedInput,
        NetworkParameters, PublicKey, TypedMessage,
    };
    use hush_engine::{MockCoprocessor, MockEngine};

    use crate::{FileKeyStorage, MemoryKeyStorage};

    /// Delegates to a mock engine, counting keypair generations.
    struct CountingEngine {
        inner: MockEngine,
        generated: AtomicUsize,
        keygen_delay: Duration,
    }

    impl CountingEngine {
        fn new() -> Self {
            let zero = AccountAddress::ZERO;
            Self {
                inner: MockEngine::new(MockCoprocessor::shared(
                    31337,
                    NetworkParameters::new(zero, zero, zero),
                )),
                generated: AtomicUsize::new(0),
                keygen_delay: Duration::ZERO,
            }
        }

        /// Widens the check-then-store window of racing callers.
        fn slow() -> Self {
            Self {
                keygen_delay: Duration::from_millis(2),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl EncryptionEngine for CountingEngine {
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
            self.generated.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.keygen_delay);
            self.inner.generate_keypair()
        }

        async fn decrypt(&self, request: &DecryptionRequest, keypair: &Keypair) -> Result<DecryptedValues> {
            self.inner.decrypt(request, keypair).await
        }
    }

    #[tokio::test]
    async fn test_ensure_generates_once() {
        let engine = CountingEngine::new();
        let store = KeypairStore::new(Arc::new(MemoryKeyStorage::new()));

        let first = store.ensure_keypair(&engine).await.unwrap();
        let second = store.ensure_keypair(&engine).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_keypair() {
        let engine = CountingEngine::new();
        let store = KeypairStore::new(Arc::new(MemoryKeyStorage::new()));

        let results = futures::future::join_all((0..8).map(|_| store.ensure_keypair(&engine))).await;
        let keypairs: Vec<Keypair> = results.into_iter().map(|r| r.unwrap()).collect();

        assert!(keypairs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stores_sharing_memory_storage_agree() {
        let storage: Arc<dyn KeypairStorage> = Arc::new(MemoryKeyStorage::new());
        let engine = Arc::new(CountingEngine::slow());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = KeypairStore::new(storage.clone());
                let engine = engine.clone();
                tokio::spawn(async move { store.ensure_keypair(engine.as_ref()).await.unwrap() })
            })
            .collect();
        let keypairs: Vec<Keypair> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(keypairs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
        assert_eq!(storage.load(KEYPAIR_STORAGE_KEY).await.unwrap(), Some(keypairs[0].clone()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stores_sharing_file_profile_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let engine = Arc::new(CountingEngine::slow());

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let store = KeypairStore::new(Arc::new(FileKeyStorage::open(&path).await.unwrap()));
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move { store.ensure_keypair(engine.as_ref()).await.unwrap() }));
        }
        let keypairs: Vec<Keypair> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(keypairs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_file_store_reuses_first_keypair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let engine = CountingEngine::new();

        let a = KeypairStore::new(Arc::new(FileKeyStorage::open(&path).await.unwrap()));
        let b = KeypairStore::new(Arc::new(FileKeyStorage::open(&path).await.unwrap()));

        let ka = a.ensure_keypair(&engine).await.unwrap();
        let kb = b.ensure_keypair(&engine).await.unwrap();

        assert_eq!(ka, kb);
        assert_eq!(a.current().await.unwrap(), Some(ka));
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_new_keypair() {
        let engine = CountingEngine::new();
        let store = KeypairStore::new(Arc::new(MemoryKeyStorage::new()));

        let first = store.ensure_keypair(&engine).await.unwrap();
        assert!(store.clear().await.unwrap());
        assert!(store.current().await.unwrap().is_none());

        let second = store.ensure_keypair(&engine).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_current_does_not_generate() {
        let engine = CountingEngine::new();
        let store = KeypairStore::new(Arc::new(MemoryKeyStorage::new()));

        assert!(store.current().await.unwrap().is_none());
        assert_eq!(engine.generated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keypair_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let engine = CountingEngine::new();

        let first = {
            let storage = FileKeyStorage::open(&path).await.unwrap();
            KeypairStore::new(Arc::new(storage)).ensure_keypair(&engine).await.unwrap()
        };

        let storage = FileKeyStorage::open(&path).await.unwrap();
        let second = KeypairStore::new(Arc::new(storage)).ensure_keypair(&engine).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_storage_key() {
        let storage = Arc::new(MemoryKeyStorage::new());
        let engine = CountingEngine::new();
        let store = KeypairStore::with_key(storage.clone(), "other");

        store.ensure_keypair(&engine).await.unwrap();
        assert!(storage.load("other").await.unwrap().is_some());
        assert!(storage.load(KEYPAIR_STORAGE_KEY).await.unwrap().is_none());
    }
}
