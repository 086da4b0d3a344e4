//! # Vel Agent
//!
//! Headless process that keeps the local content cache in sync.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. init_tracing()            RUST_LOG or "info,vel=debug,sqlx=warn"   │
//! │  2. SyncConfig::load(path)    defaults → vel-sync.toml → VEL_* env     │
//! │  3. CacheDatabase::new        SQLite file, WAL, migrations              │
//! │  4. HttpFetcher + orchestrator                                          │
//! │  5. log listener per collection                                         │
//! │  6. sync_all, then enable_auto_sync                                     │
//! │  7. wait for Ctrl-C / SIGTERM, stop timer, close database               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```text
//! vel-agent [path/to/vel-sync.toml]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vel_cache::{CacheDatabase, CacheDbConfig, CacheStore};
use vel_sync::{HttpFetcher, Subscription, SyncAllOutcome, SyncConfig, SyncOrchestratorBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path).context("loading sync config")?;
    info!(
        client_id = %config.client_id(),
        base_url = %config.base_url(),
        collections = ?config.sync.collections,
        "Configuration loaded"
    );

    let db_path = config
        .cache_path()
        .context("could not determine cache database path")?;
    let db = CacheDatabase::new(CacheDbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening cache database at {}", db_path.display()))?;

    let cache = Arc::new(CacheStore::new(db.kv_store(config.cache.namespace.clone())));
    let fetcher = Arc::new(HttpFetcher::from_config(&config)?);

    let orchestrator = SyncOrchestratorBuilder::new(config.sync.clone())
        .with_cache(cache)
        .with_fetcher(fetcher)
        .build()
        .await?;

    let subscriptions: Vec<Subscription> = config
        .sync
        .collections
        .iter()
        .map(|collection| {
            orchestrator.subscribe_to_collection(collection, |change| {
                info!(
                    collection = %change.collection,
                    updates = change.updates.len(),
                    records = change.records.len(),
                    "Collection updated"
                );
            })
        })
        .collect();

    match orchestrator.sync_all().await {
        SyncAllOutcome::Completed { reports } => {
            let failed: Vec<&str> = reports
                .iter()
                .filter(|r| !r.outcome.is_success())
                .map(|r| r.collection.as_str())
                .collect();
            if failed.is_empty() {
                info!("Initial sync complete");
            } else {
                warn!(failed = ?failed, "Initial sync incomplete, will retry on next tick");
            }
        }
        SyncAllOutcome::Skipped => {}
    }

    if orchestrator.enable_auto_sync() {
        info!(interval_ms = config.sync.interval_ms, "Waiting for updates");
    } else {
        info!("Auto-sync off, waiting for shutdown");
    }

    shutdown_signal().await;

    orchestrator.disable_auto_sync();
    for subscription in &subscriptions {
        subscription.unsubscribe();
    }

    let status = orchestrator.get_sync_status().await;
    info!(
        status = %serde_json::to_string(&status).unwrap_or_default(),
        "Final sync status"
    );

    db.close().await;
    info!("Agent stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// - `RUST_LOG=debug` - everything at debug
/// - `RUST_LOG=vel=trace` - trace for vel crates only
/// - Default: `info,vel=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vel=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
