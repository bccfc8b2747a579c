//! The backend contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Item, Result};

/// A flat, schemaless key-value store.
///
/// This is everything the upper layers need from a storage engine. Keys are
/// opaque strings; items are attribute maps.
///
/// # Conditional Writes
///
/// [`put_if_absent`](KvBackend::put_if_absent) is the only synchronization
/// primitive in the stack. It must be linearizable: of any number of
/// concurrent calls for one absent key, exactly one succeeds.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn KvBackend>`.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Strongly-consistent point read.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing is stored at `key`.
    /// * `Ok(Some(item))` - The item most recently written at `key`.
    async fn get(&self, key: &str) -> Result<Option<Item>>;

    /// Unconditional upsert.
    async fn put(&self, key: &str, item: Item) -> Result<()>;

    /// Write `item` only if nothing is stored at `key`.
    ///
    /// Fails with [`KvError::ConditionFailed`] carrying the current item if
    /// the key is occupied.
    ///
    /// [`KvError::ConditionFailed`]: crate::KvError::ConditionFailed
    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()>;

    /// Delete `key`, returning the item that was stored there, if any.
    async fn delete(&self, key: &str) -> Result<Option<Item>>;

    /// All items whose key begins with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>>;
}

// Blanket implementations for shared handles

#[async_trait]
impl<T: KvBackend + ?Sized> KvBackend for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        self.as_ref().get(key).await
    }

    async fn put(&self, key: &str, item: Item) -> Result<()> {
        self.as_ref().put(key, item).await
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()> {
        self.as_ref().put_if_absent(key, item).await
    }

    async fn delete(&self, key: &str) -> Result<Option<Item>> {
        self.as_ref().delete(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        self.as_ref().scan_prefix(prefix).await
    }
}

#[async_trait]
impl<T: KvBackend + ?Sized> KvBackend for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        self.as_ref().get(key).await
    }

    async fn put(&self, key: &str, item: Item) -> Result<()> {
        self.as_ref().put(key, item).await
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()> {
        self.as_ref().put_if_absent(key, item).await
    }

    async fn delete(&self, key: &str) -> Result<Option<Item>> {
        self.as_ref().delete(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        self.as_ref().scan_prefix(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeValue, InMemoryBackend};

    #[tokio::test]
    async fn object_safety_works() {
        let backend: Arc<dyn KvBackend> = Arc::new(InMemoryBackend::new());

        let mut item = Item::new();
        item.insert("Key".to_string(), AttributeValue::S("k".to_string()));
        backend.put("k", item.clone()).await.unwrap();

        assert_eq!(backend.get("k").await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn boxed_backend_delegates() {
        let backend: Box<dyn KvBackend> = Box::new(InMemoryBackend::new());
        backend.put("a", Item::new()).await.unwrap();
        assert!(backend.put_if_absent("a", Item::new()).await.is_err());
        assert_eq!(backend.scan_prefix("").await.unwrap().len(), 1);
        assert!(backend.delete("a").await.unwrap().is_some());
    }
}
