//! File-backed keypair storage.
//!
//! Persists every entry in one JSON object so the file can be inspected and
//! moved between machines:
//!
//! ```text
//! { "fhevm-keypair": { "publicKey": "..", "privateKey": ".." } }
//! ```
//!
//! Writers coordinate through `<file>.lock` with an OS advisory lock, so
//! several sessions or CLI runs may share one profile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use hush_core::error::{HushError, Result};
use hush_core::traits::KeypairStorage;
use hush_core::types::Keypair;

type Entries = BTreeMap<String, Keypair>;

/// JSON-file keypair storage.
///
/// Holds no cached state: every read goes to the file, and every mutation
/// re-reads it under an exclusive advisory lock on a sibling `.lock` file
/// before rewriting it through a temporary sibling and a rename. Handles
/// opened on the same path, in this process or another, therefore never
/// overwrite each other's entries.
pub struct FileKeyStorage {
    /// Path to the storage file
    path: PathBuf,
    /// Advisory lock file guarding read-modify-write
    lock_path: PathBuf,
    /// Queues this handle's writers before they contend for the file lock
    local: Mutex<()>,
}

/// Held for the duration of one read-modify-write.
struct Exclusive<'a> {
    _local: MutexGuard<'a, ()>,
    // Closing the descriptor releases the advisory lock.
    _file: std::fs::File,
}

impl FileKeyStorage {
    /// Opens storage at `path`.
    ///
    /// An existing file is validated; otherwise storage starts empty and the
    /// file is created on first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let storage = Self {
            lock_path: path.with_extension("lock"),
            path,
            local: Mutex::new(()),
        };

        let entries = storage.read_entries().await?;
        info!(path = ?storage.path, count = entries.len(), "Opened keystore");
        Ok(storage)
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Entries::new());
        }
        serde_json::from_slice(&contents).map_err(|e| {
            HushError::KeyStorageError(format!("corrupt keystore {}: {e}", self.path.display()))
        })
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Takes this handle's queue, then the cross-handle file lock.
    async fn exclusive(&self) -> Result<Exclusive<'_>> {
        let local = self.local.lock().await;
        self.ensure_parent().await?;

        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| HushError::InternalError(format!("keystore lock task failed: {e}")))??;

        Ok(Exclusive {
            _local: local,
            _file: file,
        })
    }

    /// Rewrites the file. Callers hold [`Exclusive`].
    #[instrument(skip(self, entries), fields(path = ?self.path, count = entries.len()))]
    async fn write_entries(&self, entries: &Entries) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(entries)?;

        // Write atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, &self.path).await?;
        debug!("Keystore saved");
        Ok(())
    }
}

impl std::fmt::Debug for FileKeyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyStorage").field("path", &self.path).finish()
    }
}

#[async_trait]
impl KeypairStorage for FileKeyStorage {
    async fn load(&self, key: &str) -> Result<Option<Keypair>> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn store(&self, key: &str, keypair: &Keypair) -> Result<()> {
        let _lock = self.exclusive().await?;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), keypair.clone());
        self.write_entries(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let _lock = self.exclusive().await?;
        let mut entries = self.read_entries().await?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.write_entries(&entries).await?;
        }
        Ok(existed)
    }

    async fn load_or_insert_with(
        &self,
        key: &str,
        generate: &(dyn Fn() -> Result<Keypair> + Send + Sync),
    ) -> Result<Keypair> {
        let _lock = self.exclusive().await?;
        let mut entries = self.read_entries().await?;
        if let Some(keypair) = entries.get(key) {
            return Ok(keypair.clone());
        }

        let keypair = generate()?;
        entries.insert(key.to_string(), keypair.clone());
        self.write_entries(&entries).await?;
        Ok(keypair)
    }
}
