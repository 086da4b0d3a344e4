//! # SQLite Key-Value Store
//!
//! Namespaced rows in the `kv_store` table.
//!
//! ## Table Layout
//! ```text
//! ┌────────────┬──────────────────────┬──────────────────────┬─────────────┐
//! │ namespace  │ key                  │ value                │ updated_at  │
//! ├────────────┼──────────────────────┼──────────────────────┼─────────────┤
//! │ default    │ cache_banners        │ [{"id":"b1",...}]    │ RFC 3339    │
//! │ default    │ lastSyncTimestamp    │ 1700000000000        │ RFC 3339    │
//! │ kiosk-2    │ cache_banners        │ [...]                │ RFC 3339    │
//! └────────────┴──────────────────────┴──────────────────────┴─────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::CacheResult;
use crate::kv::KvStore;

/// [`KvStore`] backed by the cache database.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteKvStore {
    /// Creates a store over `pool` scoped to `namespace`.
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        SqliteKvStore {
            pool,
            namespace: namespace.into(),
        }
    }

    /// Namespace this store reads and writes.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Lists the keys stored in this namespace, sorted.
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM kv_store WHERE namespace = ? ORDER BY key")
                .bind(&self.namespace)
                .fetch_all(&self.pool)
                .await?;
        Ok(keys)
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get_item(&self, key: &str) -> CacheResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
                .bind(&self.namespace)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> CacheResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv_store (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (namespace, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(namespace = %self.namespace, key = %key, bytes = value.len(), "Stored cache entry");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        let result = sqlx::query("DELETE FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!(
            namespace = %self.namespace,
            key = %key,
            removed = result.rows_affected(),
            "Removed cache entry"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::CacheDatabase;

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let db = CacheDatabase::in_memory().await.unwrap();
        let kv = db.kv_store("default");

        assert_eq!(kv.get_item("cache_banners").await.unwrap(), None);

        kv.set_item("cache_banners", "[]").await.unwrap();
        kv.set_item("cache_banners", r#"[{"id":"b1","version":1}]"#)
            .await
            .unwrap();
        assert_eq!(
            kv.get_item("cache_banners").await.unwrap().as_deref(),
            Some(r#"[{"id":"b1","version":1}]"#)
        );

        kv.remove_item("cache_banners").await.unwrap();
        kv.remove_item("cache_banners").await.unwrap();
        assert_eq!(kv.get_item("cache_banners").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = CacheDatabase::in_memory().await.unwrap();
        let first = db.kv_store("first");
        let second = db.kv_store("second");

        first.set_item("lastSyncTimestamp", "100").await.unwrap();
        second.set_item("lastSyncTimestamp", "200").await.unwrap();

        assert_eq!(first.get_item("lastSyncTimestamp").await.unwrap().as_deref(), Some("100"));
        assert_eq!(second.get_item("lastSyncTimestamp").await.unwrap().as_deref(), Some("200"));
        assert_eq!(first.keys().await.unwrap(), vec!["lastSyncTimestamp".to_string()]);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let db = CacheDatabase::new(crate::CacheDbConfig::new(&path)).await.unwrap();
            db.kv_store("default").set_item("k", "v").await.unwrap();
            db.close().await;
        }

        let db = CacheDatabase::new(crate::CacheDbConfig::new(&path)).await.unwrap();
        assert_eq!(
            db.kv_store("default").get_item("k").await.unwrap().as_deref(),
            Some("v")
        );
    }
}
