//! Filesystem semantics over a flat key-value backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use kvfs_backend::KvBackend;
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;
use crate::record::{key_of, Record};
use crate::{Error, Key, KeyInfo, Locker, Presence, Result, Storage, StorageConfig};

/// A [`Storage`] emulating files and directories on a [`KvBackend`].
///
/// Every stored file `a/b/c` is accompanied by directory markers at `a` and
/// `a/b`, so directories can be stat'ed and found by prefix scans. There is
/// no cache: every call is a round trip to the backend.
///
/// # Example
///
/// ```rust,ignore
/// use kvfs_backend::InMemoryBackend;
/// use kvfs_core::{KvStorage, Storage};
/// use tokio_util::sync::CancellationToken;
///
/// let storage = KvStorage::new(InMemoryBackend::new());
/// let cancel = CancellationToken::new();
///
/// storage.store(&cancel, "certs/example.com/cert.pem", pem.into()).await?;
/// assert!(!storage.stat(&cancel, "certs/example.com").await?.is_terminal);
/// ```
pub struct KvStorage<B: ?Sized> {
    backend: Arc<B>,
    locker: Locker<B>,
}

impl<B: ?Sized> Clone for KvStorage<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            locker: self.locker.clone(),
        }
    }
}

impl<B: KvBackend> KvStorage<B> {
    /// Create a storage with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StorageConfig::default())
    }

    pub fn with_config(backend: B, config: StorageConfig) -> Self {
        Self::from_arc(Arc::new(backend), config)
    }
}

impl<B: KvBackend + ?Sized> KvStorage<B> {
    /// Create a storage over a shared backend handle.
    pub fn from_arc(backend: Arc<B>, config: StorageConfig) -> Self {
        Self {
            locker: Locker::new(backend.clone(), config),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The locker sharing this storage's backend and configuration.
    pub fn locker(&self) -> &Locker<B> {
        &self.locker
    }

    pub fn config(&self) -> &StorageConfig {
        self.locker.config()
    }

    /// Check whether `key` exists without hiding failures.
    ///
    /// [`Storage::exists`] is the `Present`-or-not projection of this.
    pub async fn probe(&self, cancel: &CancellationToken, key: &str) -> Presence {
        let Ok(key) = self.path(key) else {
            return Presence::Absent;
        };

        match cancellable(cancel, self.backend.get(key.as_str())).await {
            Ok(Some(_)) => Presence::Present,
            Ok(None) => Presence::Absent,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Existence check failed");
                Presence::Indeterminate
            }
        }
    }

    /// Parse a path key, refusing any key that could reach a lock record.
    ///
    /// Lock records live at `lock_prefix + name`. A key starting with the
    /// prefix could be one, and a key that is a directory above the prefix
    /// (`locks` for the prefix `locks/`) would list or delete them.
    fn path(&self, raw: &str) -> Result<Key> {
        let key = Key::parse(raw)?;
        let prefix = self.config().lock_prefix.as_str();

        if raw.starts_with(prefix) || prefix.starts_with(&key.dir_prefix()) {
            return Err(Error::InvalidKey {
                key: raw.to_string(),
                message: format!("overlaps the lock namespace {:?}", prefix),
            });
        }
        Ok(key)
    }

    async fn read(&self, cancel: &CancellationToken, key: &Key) -> Result<Record> {
        match cancellable(cancel, self.backend.get(key.as_str())).await? {
            Some(item) => Record::decode(&item),
            None => Err(Error::not_found(key.as_str())),
        }
    }

    /// Every item strictly beneath `dir`; not-found if there are none.
    async fn scan_dir(
        &self,
        cancel: &CancellationToken,
        dir: &Key,
    ) -> Result<Vec<kvfs_backend::Item>> {
        let items = cancellable(cancel, self.backend.scan_prefix(&dir.dir_prefix())).await?;
        if items.is_empty() {
            return Err(Error::not_found(dir.as_str()));
        }
        Ok(items)
    }
}

#[async_trait]
impl<B: KvBackend + ?Sized> Storage for KvStorage<B> {
    async fn store(&self, cancel: &CancellationToken, key: &str, value: Bytes) -> Result<()> {
        let key = self.path(key)?;
        let now = Utc::now();

        for ancestor in key.ancestors() {
            let marker = Record::marker(ancestor, now);
            cancellable(cancel, self.backend.put(ancestor, marker.encode())).await?;
        }

        let file = Record::file(key.as_str(), value, now);
        cancellable(cancel, self.backend.put(key.as_str(), file.encode())).await?;

        tracing::debug!(key = %key, size = file.size, "Stored file");
        Ok(())
    }

    async fn load(&self, cancel: &CancellationToken, key: &str) -> Result<Bytes> {
        let key = self.path(key)?;
        Ok(self.read(cancel, &key).await?.contents)
    }

    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<()> {
        let key = self.path(key)?;

        let previous = cancellable(cancel, self.backend.delete(key.as_str())).await?;
        if let Some(item) = previous {
            if Record::decode(&item)?.is_terminal {
                tracing::debug!(key = %key, "Deleted file");
                return Ok(());
            }
        }

        // A directory marker, or no record at all: sweep everything beneath.
        let beneath = self.scan_dir(cancel, &key).await?;
        for item in &beneath {
            let child = key_of(item)?;
            cancellable(cancel, self.backend.delete(child)).await?;
        }

        tracing::debug!(key = %key, removed = beneath.len(), "Deleted directory");
        Ok(())
    }

    async fn exists(&self, cancel: &CancellationToken, key: &str) -> bool {
        self.probe(cancel, key).await.exists()
    }

    async fn list(
        &self,
        cancel: &CancellationToken,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<String>> {
        let path = self.path(path)?;
        let items = self.scan_dir(cancel, &path).await?;

        let mut keys = Vec::with_capacity(items.len());
        for item in &items {
            let record = Record::decode(item)?;
            // Deeper keys are dropped, not rolled up into their direct child.
            if !recursive && !path.is_parent_of(&record.key) {
                continue;
            }
            keys.push(record.key);
        }
        Ok(keys)
    }

    async fn stat(&self, cancel: &CancellationToken, key: &str) -> Result<KeyInfo> {
        let key = self.path(key)?;
        let record = self.read(cancel, &key).await?;
        Ok(KeyInfo {
            key: record.key,
            modified: record.modified,
            is_terminal: record.is_terminal,
            size: record.size,
        })
    }

    async fn lock(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        self.locker.lock(cancel, name).await
    }

    async fn unlock(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        self.locker.unlock(cancel, name).await
    }
}
