//! In-memory keypair storage.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use hush_core::error::Result;
use hush_core::traits::KeypairStorage;
use hush_core::types::Keypair;

/// In-memory keypair storage.
///
/// Thread-safe; contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryKeyStorage {
    entries: DashMap<String, Keypair>,
}

impl MemoryKeyStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeypairStorage for MemoryKeyStorage {
    async fn load(&self, key: &str) -> Result<Option<Keypair>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn store(&self, key: &str, keypair: &Keypair) -> Result<()> {
        self.entries.insert(key.to_string(), keypair.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn load_or_insert_with(
        &self,
        key: &str,
        generate: &(dyn Fn() -> Result<Keypair> + Send + Sync),
    ) -> Result<Keypair> {
        // The shard stays write-locked until the entry is filled.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let keypair = generate()?;
                entry.insert(keypair.clone());
                Ok(keypair)
            }
        }
    }
}
