//! # vel-sync: Content Sync Engine
//!
//! Keeps per-collection caches of backend content fresh by polling for
//! records changed since the last successful sync.
//!
//! ## Sync Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Vel Sync Architecture                           │
//! │                                                                         │
//! │   Content backend                                                       │
//! │   /api/sync/check, /api/sync/item                                      │
//! │         ▲                                                               │
//! │         │ HTTP (reqwest)                                                │
//! │  ┌──────┴───────┐     ┌────────────────────┐     ┌──────────────────┐  │
//! │  │ HttpFetcher  │◄────│  SyncOrchestrator  │────►│   CacheStore     │  │
//! │  │ (fetcher.rs) │     │ (orchestrator.rs)  │     │   (vel-cache)    │  │
//! │  └──────────────┘     │                    │     └──────────────────┘  │
//! │                       │  merge (vel-core)  │                           │
//! │  ┌──────────────┐     │  checkpoint        │     ┌──────────────────┐  │
//! │  │ AutoSyncTask │────►│  Idle / Syncing    │────►│ Subscription     │  │
//! │  │(scheduler.rs)│tick │                    │     │ Registry         │  │
//! │  └──────────────┘     └────────────────────┘     │ (registry.rs)    │  │
//! │                                                  └────────┬─────────┘  │
//! │                                                           ▼             │
//! │                                                   UI listeners          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//! - `config`: Sync configuration (TOML + env overrides)
//! - `error`: Sync-specific error types
//! - `fetcher`: `RemoteFetcher` trait and the HTTP implementation
//! - `orchestrator`: Sync cycles, checkpoint, status
//! - `registry`: Per-collection change listeners
//! - `scheduler`: Auto-sync timer

pub mod config;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod registry;
mod scheduler;

pub use config::{CacheSettings, ClientConfig, RemoteSettings, SyncConfig, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use fetcher::{HttpFetcher, RemoteFetcher};
pub use orchestrator::{
    CollectionOutcome, CollectionReport, SyncAllOutcome, SyncOrchestrator, SyncOrchestratorBuilder,
};
pub use registry::{CollectionChange, ListenerId, Subscription, SubscriptionRegistry};
