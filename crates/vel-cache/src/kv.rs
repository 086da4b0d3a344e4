//! # Key-Value Substrate
//!
//! The minimal durable string store the cache is built on. Anything offering
//! get/set/remove of strings by key can back a [`CacheStore`](crate::CacheStore).

use async_trait::async_trait;

use crate::error::CacheResult;

/// Durable string key-value store.
///
/// ## Implementations
/// - [`SqliteKvStore`](crate::SqliteKvStore): rows in the `kv_store` table
/// - [`MemoryKvStore`](crate::MemoryKvStore): process memory, for tests and
///   ephemeral clients
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the stored value, or `None` if the key is absent.
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> CacheResult<()>;
}
