//! In-process key-value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CacheError, CacheResult};
use crate::kv::KvStore;

/// [`KvStore`] held in process memory.
///
/// Read-only and unreadable switches let callers simulate a substrate that
/// refuses writes (a full storage quota) or reads (an exhausted pool).
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    items: RwLock<HashMap<String, String>>,
    read_only: AtomicBool,
    unreadable: AtomicBool,
}

impl MemoryKvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes and removals fail with
    /// [`CacheError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Makes subsequent reads fail with [`CacheError::Unavailable`].
    pub fn set_unreadable(&self, unreadable: bool) {
        self.unreadable.store(unreadable, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Returns true when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    fn check_writable(&self) -> CacheResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        if self.unreadable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("store is unreadable".to_string()));
        }
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> CacheResult<()> {
        self.check_writable()?;
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        self.check_writable()?;
        self.items.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let kv = MemoryKvStore::new();
        assert_eq!(kv.get_item("k").await.unwrap(), None);

        kv.set_item("k", "v1").await.unwrap();
        kv.set_item("k", "v2").await.unwrap();
        assert_eq!(kv.get_item("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(kv.len().await, 1);

        kv.remove_item("k").await.unwrap();
        kv.remove_item("k").await.unwrap();
        assert!(kv.is_empty().await);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let kv = MemoryKvStore::new();
        kv.set_item("k", "v").await.unwrap();
        kv.set_read_only(true);

        assert!(matches!(
            kv.set_item("k", "other").await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(kv.remove_item("k").await.is_err());
        assert_eq!(kv.get_item("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_unreadable_rejects_reads() {
        let kv = MemoryKvStore::new();
        kv.set_item("k", "v").await.unwrap();
        kv.set_unreadable(true);

        assert!(matches!(kv.get_item("k").await, Err(CacheError::Unavailable(_))));

        kv.set_unreadable(false);
        assert_eq!(kv.get_item("k").await.unwrap().as_deref(), Some("v"));
    }
}
