//! # Cache Database Pool
//!
//! Connection pool creation and configuration for the SQLite cache file.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cache Connection Pool                              │
//! │                                                                         │
//! │  Agent Startup                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheDbConfig::new(path) ← Configure pool settings                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheDatabase::new(config).await ← Create pool + run migrations       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.kv_store("default") ──► SqliteKvStore (one namespace)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CacheStore::new(Arc<dyn KvStore>)                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so readers (status queries) never wait on
//! the writer (a sync cycle persisting a collection).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::migrations;
use crate::sqlite::SqliteKvStore;

// =============================================================================
// Configuration
// =============================================================================

/// Cache database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = CacheDbConfig::new("/path/to/vel-cache.db")
///     .max_connections(4);
/// ```
#[derive(Debug, Clone)]
pub struct CacheDbConfig {
    /// Path to the SQLite database file. `None` means a private in-memory
    /// database.
    pub database_path: Option<PathBuf>,

    /// Maximum number of connections in the pool.
    /// Default: 4
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl CacheDbConfig {
    /// Creates a configuration for a database file, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CacheDbConfig {
            database_path: Some(path.into()),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory configuration (tests, ephemeral agents).
    ///
    /// The database lives as long as its single pooled connection, so the
    /// pool never retires it.
    pub fn in_memory() -> Self {
        CacheDbConfig {
            database_path: None,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// Returns true for the in-memory configuration.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle over the cache database pool.
#[derive(Debug, Clone)]
pub struct CacheDatabase {
    pool: SqlitePool,
}

impl CacheDatabase {
    /// Opens (or creates) the cache database and runs migrations.
    ///
    /// ## What This Does
    /// 1. Creates the database file and parent directory if missing
    /// 2. Enables WAL + NORMAL synchronous for file databases
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: CacheDbConfig) -> CacheResult<Self> {
        let pool = match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "Opening cache database");

                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
                    }
                }

                let connect_url = format!("sqlite://{}?mode=rwc", path.display());
                let options = SqliteConnectOptions::from_str(&connect_url)
                    .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .create_if_missing(true);

                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(config.connect_timeout)
                    .idle_timeout(Some(config.idle_timeout))
                    .connect_with(options)
                    .await
                    .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            }
            None => {
                info!("Opening in-memory cache database");

                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

                // Closing the only connection would drop every table.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .acquire_timeout(config.connect_timeout)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            }
        };

        debug!(max_connections = config.max_connections, "Cache pool created");

        let db = CacheDatabase { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Opens a fresh in-memory cache database.
    pub async fn in_memory() -> CacheResult<Self> {
        CacheDatabase::new(CacheDbConfig::in_memory()).await
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> CacheResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns a key-value store scoped to `namespace`.
    ///
    /// Namespaces let several clients share one database file without
    /// seeing each other's caches.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let kv = db.kv_store("kiosk-1");
    /// let cache = CacheStore::new(kv);
    /// ```
    pub fn kv_store(&self, namespace: impl Into<String>) -> Arc<SqliteKvStore> {
        Arc::new(SqliteKvStore::new(self.pool.clone(), namespace))
    }

    /// Closes the pool. Subsequent store operations fail.
    pub async fn close(&self) {
        info!("Closing cache database pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
