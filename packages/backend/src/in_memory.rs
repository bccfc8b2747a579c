//! In-memory backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{Item, KvBackend, KvError, Result};

/// A backend holding every item in a process-local map.
///
/// Clones share the same map, so several storages or lockers built from
/// clones of one `InMemoryBackend` see a single key space. Every operation
/// runs under one mutex and is therefore linearizable.
///
/// # Example
///
/// ```rust,ignore
/// use kvfs_backend::{InMemoryBackend, Item, KvBackend};
///
/// let backend = InMemoryBackend::new();
/// let other = backend.clone();
///
/// backend.put("a", Item::new()).await?;
/// assert!(other.get("a").await?.is_some());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    items: Arc<Mutex<BTreeMap<String, Item>>>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    ///
    /// Inspection still works after a panic poisoned the map; the backend
    /// operations themselves fail with [`KvError::Poisoned`].
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the backend holds no keys.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// All stored keys, in key order.
    pub fn keys(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    fn snapshot(&self) -> MutexGuard<'_, BTreeMap<String, Item>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn items(&self) -> Result<MutexGuard<'_, BTreeMap<String, Item>>> {
        self.items.lock().map_err(|_| KvError::Poisoned)
    }
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        Ok(self.items()?.get(key).cloned())
    }

    async fn put(&self, key: &str, item: Item) -> Result<()> {
        self.items()?.insert(key.to_string(), item);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()> {
        let mut items = self.items()?;
        if let Some(current) = items.get(key) {
            return Err(KvError::ConditionFailed {
                current: current.clone(),
            });
        }
        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<Option<Item>> {
        Ok(self.items()?.remove(key))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        let items = self.items()?;
        Ok(items
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }
}
