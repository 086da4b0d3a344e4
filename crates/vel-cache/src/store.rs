//! # Cache Store
//!
//! Per-collection record sets and the sync checkpoint, kept in memory and
//! written through to a [`KvStore`].
//!
//! ## Read / Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  get("banners")                                                        │
//! │     │                                                                   │
//! │     ├── mirror hit?  ──► clone of cached Vec<Record>                   │
//! │     │                                                                   │
//! │     └── miss ──► kv.get_item("cache_banners")                          │
//! │                     ├── Some(json) parses ──► mirror + return          │
//! │                     ├── None               ──► []                      │
//! │                     ├── bad JSON           ──► [] (warn!)              │
//! │                     └── substrate error    ──► [] (warn!)              │
//! │                                                                         │
//! │  try_get("banners")  same, but a substrate error is returned           │
//! │                                                                         │
//! │  try_put("banners", records)                                           │
//! │     │                                                                   │
//! │     ├── 1. mirror["banners"] = records      (always)                   │
//! │     └── 2. kv.set_item("cache_banners", json)                          │
//! │              └── Err ──► returned; in-memory copy still serves reads   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use vel_core::Record;

use crate::error::{CacheError, CacheResult};
use crate::kv::KvStore;

/// Substrate key holding the sync checkpoint (epoch millis).
pub const CHECKPOINT_KEY: &str = "lastSyncTimestamp";

/// Substrate key for a collection's record set.
pub fn cache_key(collection: &str) -> String {
    format!("cache_{collection}")
}

/// Collection cache over a key-value substrate.
pub struct CacheStore {
    kv: Arc<dyn KvStore>,
    mirror: RwLock<HashMap<String, Vec<Record>>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Creates a cache over `kv` with an empty mirror.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        CacheStore {
            kv,
            mirror: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached records of `collection`, or `[]`.
    ///
    /// Never fails: unreadable or corrupt entries are logged and treated as
    /// an empty collection. Use [`CacheStore::try_get`] before writing a
    /// merged set back.
    pub async fn get(&self, collection: &str) -> Vec<Record> {
        self.try_get(collection).await.unwrap_or_else(|e| {
            warn!(collection = %collection, error = %e, "Failed to read cached collection");
            Vec::new()
        })
    }

    /// Returns the cached records of `collection`, reporting substrate read
    /// errors.
    ///
    /// A missing entry is `[]`. So is an entry that no longer parses: its
    /// contents are unrecoverable and the next write replaces it.
    pub async fn try_get(&self, collection: &str) -> CacheResult<Vec<Record>> {
        if let Some(records) = self.mirror.read().await.get(collection) {
            return Ok(records.clone());
        }

        let Some(raw) = self.kv.get_item(&cache_key(collection)).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Record>>(&raw) {
            Ok(records) => {
                debug!(collection = %collection, count = records.len(), "Loaded collection from substrate");
                self.mirror
                    .write()
                    .await
                    .insert(collection.to_string(), records.clone());
                Ok(records)
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "Discarding unparsable cached collection");
                Ok(Vec::new())
            }
        }
    }

    /// Replaces the cached set of `collection`, reporting substrate errors.
    ///
    /// The in-memory copy is updated even when the substrate write fails.
    pub async fn try_put(&self, collection: &str, records: &[Record]) -> CacheResult<()> {
        self.mirror
            .write()
            .await
            .insert(collection.to_string(), records.to_vec());

        let key = cache_key(collection);
        let json =
            serde_json::to_string(records).map_err(|e| CacheError::serialization(&key, e))?;
        self.kv.set_item(&key, &json).await?;

        debug!(collection = %collection, count = records.len(), "Persisted collection");
        Ok(())
    }

    /// Replaces the cached set of `collection`; substrate errors are logged.
    pub async fn put(&self, collection: &str, records: &[Record]) {
        if let Err(e) = self.try_put(collection, records).await {
            warn!(collection = %collection, error = %e, "Failed to persist collection");
        }
    }

    /// Drops the cached set of `collection` from memory and the substrate.
    ///
    /// If the substrate refuses the removal, the collection stays empty in
    /// memory so the stale entry is not read back this session.
    pub async fn clear(&self, collection: &str) {
        let mut mirror = self.mirror.write().await;

        match self.kv.remove_item(&cache_key(collection)).await {
            Ok(()) => {
                mirror.remove(collection);
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "Failed to clear cached collection");
                mirror.insert(collection.to_string(), Vec::new());
            }
        }
    }

    /// Clears every collection in `collections`.
    pub async fn clear_all<S: AsRef<str>>(&self, collections: &[S]) {
        for collection in collections {
            self.clear(collection.as_ref()).await;
        }
    }

    /// Loads the persisted checkpoint, if any.
    pub async fn load_checkpoint(&self) -> Option<i64> {
        match self.kv.get_item(CHECKPOINT_KEY).await {
            Ok(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(ts) => Some(ts),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Ignoring unparsable checkpoint");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read checkpoint");
                None
            }
        }
    }

    /// Persists the checkpoint.
    pub async fn save_checkpoint(&self, timestamp_ms: i64) -> CacheResult<()> {
        self.kv
            .set_item(CHECKPOINT_KEY, &timestamp_ms.to_string())
            .await
    }
}
