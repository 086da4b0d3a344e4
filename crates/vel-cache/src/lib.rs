//! # vel-cache: Local Cache Store
//!
//! Durable persistence of the latest known record set per collection, and of
//! the sync checkpoint.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vel Cache Data Flow                              │
//! │                                                                         │
//! │  SyncOrchestrator (vel-sync)                                           │
//! │       │  get / try_put / clear / checkpoint                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    vel-cache (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  CacheStore   │    │   KvStore     │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │   (kv.rs)     │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ memory mirror │───►│ SqliteKvStore │    │ 001_kv_store │  │   │
//! │  │   │ cache_<name>  │    │ MemoryKvStore │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL mode) or process memory                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vel_cache::{CacheDatabase, CacheDbConfig, CacheStore};
//!
//! let db = CacheDatabase::new(CacheDbConfig::new("./vel-cache.db")).await?;
//! let cache = CacheStore::new(db.kv_store("default"));
//!
//! let wallpapers = cache.get("wallpapers").await;
//! ```

pub mod database;
pub mod error;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use database::{CacheDatabase, CacheDbConfig};
pub use error::{CacheError, CacheResult};
pub use kv::KvStore;
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
pub use store::{cache_key, CacheStore, CHECKPOINT_KEY};
