//! # Cache Error Types
//!
//! Error types for cache substrate operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / serde_json::Error                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ├──► CacheStore::get / put  → logged, degrade to empty / no-op   │
//! │       │                                                                 │
//! │       └──► CacheStore::try_put    → SyncOrchestrator skips the         │
//! │                                     checkpoint advance for that cycle  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Cache substrate errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Opening the database failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Records could not be encoded or decoded.
    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// The substrate refused the operation (quota exceeded, read-only, ...).
    #[error("Cache substrate unavailable: {0}")]
    Unavailable(String),

    /// Internal cache error.
    #[error("Internal cache error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Creates a Serialization error for a given key.
    pub fn serialization(key: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::Serialization {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convert sqlx errors to CacheError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → CacheError::QueryFailed
/// sqlx::Error::PoolTimedOut   → CacheError::PoolExhausted
/// sqlx::Error::PoolClosed     → CacheError::ConnectionFailed
/// Other                       → CacheError::Internal
/// ```
impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => CacheError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => CacheError::PoolExhausted,
            sqlx::Error::PoolClosed => CacheError::ConnectionFailed("Pool is closed".to_string()),
            _ => CacheError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CacheError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CacheError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::serialization("<unknown>", err)
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(
            CacheError::from(sqlx::Error::PoolTimedOut),
            CacheError::PoolExhausted
        ));
        assert!(matches!(
            CacheError::from(sqlx::Error::PoolClosed),
            CacheError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_serialization_display() {
        let err = CacheError::serialization("cache_banners", "expected value at line 1");
        assert!(err.to_string().contains("cache_banners"));
    }
}
