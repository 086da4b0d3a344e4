//! # Sync Orchestrator
//!
//! Drives fetch → merge → persist → notify cycles and owns the checkpoint.
//!
//! ## Collection Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     sync_collection("banners")                          │
//! │                                                                         │
//! │  lock(banners) ─► cycle_start = now                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fetcher.fetch_since("banners", checkpoint)                            │
//! │       ├── Err  ──────────────────────────► Failed (checkpoint kept)    │
//! │       ├── []   ──────────────────────────► NoChanges                   │
//! │       └── updates                                                       │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  cache.try_get("banners")                                              │
//! │             ├── Err ─────────────────────► Failed (nothing written)    │
//! │             ▼                                                           │
//! │  merge(cached, updates)                                                │
//! │             │                                                           │
//! │             ▼                                                           │
//! │  cache.try_put("banners", merged)                                      │
//! │             ├── Err ─────────────────────► Failed (no notify)          │
//! │             ▼                                                           │
//! │  registry.notify(CollectionChange)  ─────► Merged                      │
//! │                                                                         │
//! │  NoChanges / Merged ─► checkpoint = max(checkpoint, cycle_start)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Full Sync
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync_all()                                                             │
//! │     │                                                                   │
//! │     ├── phase == Syncing ──► Skipped (no fetch)                        │
//! │     │                                                                   │
//! │     └── phase = Syncing (reset to Idle when the guard drops)           │
//! │           since = checkpoint, cycle_start = now                        │
//! │           for each configured collection, in order:                    │
//! │               cycle(collection, since)                                 │
//! │           any retryable failure? → checkpoint kept, the window is      │
//! │                                    fetched again next time             │
//! │           otherwise              → checkpoint = cycle_start            │
//! │                                    (a collection the backend rejects   │
//! │                                    does not pin it)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transient failures never escape: every public operation returns an
//! outcome value and logs what went wrong.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};
use vel_cache::CacheStore;
use vel_core::{merge_with_report, overwrite, MergeReport, Record, SyncPhase, SyncStatus};

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::RemoteFetcher;
use crate::registry::{CollectionChange, Subscription, SubscriptionRegistry};
use crate::scheduler::AutoSyncTask;

// =============================================================================
// Outcomes
// =============================================================================

/// Result of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Updates were merged, persisted and announced.
    Merged {
        /// Records received from the backend.
        fetched: usize,
        /// What the merge did with them.
        report: MergeReport,
        /// Size of the cached set after the merge.
        total: usize,
    },

    /// The backend had nothing newer than the checkpoint.
    NoChanges,

    /// Fetching, reading the cache or persisting failed; the cache state
    /// for the next cycle is the state before this one.
    Failed {
        /// Logged error text.
        reason: String,
        /// Whether the same window may succeed on a later attempt. Network
        /// errors, 5xx, 429 and cache I/O are; rejected requests and
        /// undecodable responses are not.
        retryable: bool,
    },
}

impl CollectionOutcome {
    /// True unless the cycle failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, CollectionOutcome::Failed { .. })
    }

    /// True if the cycle failed in a way worth retrying with the same
    /// checkpoint.
    pub fn is_retryable_failure(&self) -> bool {
        matches!(self, CollectionOutcome::Failed { retryable: true, .. })
    }
}

/// Outcome of one collection inside a full sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    /// Collection name.
    pub collection: String,
    /// What happened to it.
    pub outcome: CollectionOutcome,
}

/// Result of [`SyncOrchestrator::sync_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAllOutcome {
    /// Another full sync was in progress; nothing was fetched.
    Skipped,

    /// Every configured collection was visited, in configuration order.
    Completed {
        /// One report per configured collection.
        reports: Vec<CollectionReport>,
    },
}

impl SyncAllOutcome {
    /// True if the call was a no-op because a sync was already running.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncAllOutcome::Skipped)
    }

    /// True if the run completed and no collection failed.
    pub fn all_succeeded(&self) -> bool {
        match self {
            SyncAllOutcome::Skipped => false,
            SyncAllOutcome::Completed { reports } => {
                reports.iter().all(|r| r.outcome.is_success())
            }
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Resets the phase to `Idle` when a full sync ends, however it ends.
struct PhaseGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = SyncPhase::Idle;
    }
}

/// Keeps collection caches fresh against the backend.
///
/// Built with [`SyncOrchestratorBuilder`]; always shared behind an `Arc` so
/// the auto-sync timer can hold a weak reference.
///
/// ## Usage
/// ```rust,ignore
/// let orchestrator = SyncOrchestratorBuilder::new(config.sync.clone())
///     .with_cache(cache)
///     .with_fetcher(Arc::new(HttpFetcher::from_config(&config)?))
///     .build()
///     .await?;
///
/// let sub = orchestrator.subscribe_to_collection("banners", |change| {
///     println!("{} banners", change.records.len());
/// });
/// orchestrator.sync_all().await;
/// orchestrator.enable_auto_sync();
/// ```
pub struct SyncOrchestrator {
    settings: SyncSettings,
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    registry: SubscriptionRegistry,

    /// Epoch millis; only ever moves forward.
    checkpoint: AtomicI64,
    /// Serializes checkpoint persistence so the stored value is monotonic too.
    checkpoint_write: AsyncMutex<()>,

    phase: Mutex<SyncPhase>,
    collection_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    auto_sync: Mutex<Option<AutoSyncTask>>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("settings", &self.settings)
            .field("checkpoint", &self.checkpoint.load(Ordering::SeqCst))
            .field("phase", &*self.phase.lock())
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    // =========================================================================
    // Sync Operations
    // =========================================================================

    /// Syncs every configured collection, sequentially and in order.
    ///
    /// Returns [`SyncAllOutcome::Skipped`] without fetching if a full sync
    /// is already running. The checkpoint advances unless some collection
    /// failed in a retryable way.
    pub async fn sync_all(&self) -> SyncAllOutcome {
        let Some(_guard) = self.try_begin_full_sync() else {
            debug!("Full sync already in progress, skipping");
            return SyncAllOutcome::Skipped;
        };

        let since = self.last_sync_timestamp();
        let cycle_start = now_ms();
        info!(
            collections = self.settings.collections.len(),
            since = since,
            "Starting full sync"
        );

        let mut reports = Vec::with_capacity(self.settings.collections.len());
        for collection in &self.settings.collections {
            let outcome = self.locked_cycle(collection, since).await;
            reports.push(CollectionReport {
                collection: collection.clone(),
                outcome,
            });
        }

        let failed = reports.iter().filter(|r| !r.outcome.is_success()).count();
        let retryable = reports
            .iter()
            .filter(|r| r.outcome.is_retryable_failure())
            .count();

        if retryable > 0 {
            warn!(
                failed = failed,
                retryable = retryable,
                collections = reports.len(),
                "Full sync finished with failures, checkpoint kept"
            );
        } else {
            self.advance_checkpoint(cycle_start).await;
            if failed > 0 {
                warn!(
                    failed = failed,
                    collections = reports.len(),
                    "Full sync finished, rejected collections skipped"
                );
            } else {
                info!(collections = reports.len(), "Full sync complete");
            }
        }

        SyncAllOutcome::Completed { reports }
    }

    /// Syncs one collection against the current checkpoint.
    ///
    /// On success (including an empty fetch) the checkpoint moves to the
    /// time this cycle started.
    pub async fn sync_collection(&self, collection: &str) -> CollectionOutcome {
        let lock = self.collection_lock(collection);
        let _held = lock.lock().await;

        let since = self.last_sync_timestamp();
        let cycle_start = now_ms();

        let outcome = self.run_cycle(collection, since).await;
        if outcome.is_success() {
            self.advance_checkpoint(cycle_start).await;
        }
        outcome
    }

    /// Fetches one record and writes it into the cache regardless of
    /// version, then notifies listeners.
    ///
    /// A tombstone removes the cached record. Returns the fetched record, or
    /// `None` if it was not found or anything failed (nothing changes then).
    pub async fn force_sync_item(&self, collection: &str, id: &str) -> Option<Record> {
        let lock = self.collection_lock(collection);
        let _held = lock.lock().await;

        let record = match self.fetcher.fetch_one(collection, id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(collection = %collection, id = %id, "Force sync: item not found");
                return None;
            }
            Err(e) => {
                warn!(collection = %collection, id = %id, error = %e, "Force sync failed");
                return None;
            }
        };

        let existing = match self.cache.try_get(collection).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(collection = %collection, id = %id, error = %e, "Force sync: failed to read cache");
                return None;
            }
        };
        let records = overwrite(&existing, record.clone());

        if let Err(e) = self.cache.try_put(collection, &records).await {
            error!(collection = %collection, id = %id, error = %e, "Force sync: failed to persist");
            return None;
        }

        let change = CollectionChange {
            collection: collection.to_string(),
            updates: vec![record.clone()],
            records,
        };
        let delivered = self.registry.notify(&change);

        info!(
            collection = %collection,
            id = %id,
            version = record.version,
            deleted = record.deleted,
            listeners = delivered,
            "Force-synced item"
        );
        Some(record)
    }

    // =========================================================================
    // Cache Access
    // =========================================================================

    /// Cached records of `collection`; `[]` if none.
    pub async fn get_cached_data(&self, collection: &str) -> Vec<Record> {
        self.cache.get(collection).await
    }

    /// Cached records of `collection` with their payload decoded as `T`.
    ///
    /// Records whose payload does not fit `T` are skipped and logged.
    pub async fn get_cached_as<T: DeserializeOwned>(&self, collection: &str) -> Vec<Record<T>> {
        self.cache
            .get(collection)
            .await
            .into_iter()
            .filter_map(|record| match record.into_typed::<T>() {
                Ok(typed) => Some(typed),
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Skipping record with unexpected shape");
                    None
                }
            })
            .collect()
    }

    /// Drops the cached records of `collection`. The checkpoint is kept.
    pub async fn clear_cache(&self, collection: &str) {
        let lock = self.collection_lock(collection);
        let _held = lock.lock().await;

        self.cache.clear(collection).await;
        info!(collection = %collection, "Cache cleared");
    }

    /// Drops the cached records of every configured collection.
    pub async fn clear_all_caches(&self) {
        for collection in &self.settings.collections {
            self.clear_cache(collection).await;
        }
    }

    // =========================================================================
    // Subscriptions & Status
    // =========================================================================

    /// Registers `callback` for changes to `collection`.
    pub fn subscribe_to_collection<F>(&self, collection: &str, callback: F) -> Subscription
    where
        F: Fn(&CollectionChange) + Send + Sync + 'static,
    {
        self.registry.subscribe(collection, callback)
    }

    /// Registry shared with this orchestrator.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Current status snapshot.
    pub async fn get_sync_status(&self) -> SyncStatus {
        let mut cached_collections = Vec::new();
        for collection in &self.settings.collections {
            if !self.cache.get(collection).await.is_empty() {
                cached_collections.push(collection.clone());
            }
        }

        let phase = *self.phase.lock();
        SyncStatus {
            last_sync_timestamp: self.last_sync_timestamp(),
            sync_in_progress: phase.is_syncing(),
            phase,
            cached_collections,
            auto_sync_enabled: self.is_auto_sync_enabled(),
        }
    }

    /// Checkpoint in epoch millis.
    pub fn last_sync_timestamp(&self) -> i64 {
        self.checkpoint.load(Ordering::SeqCst)
    }

    /// Settings this orchestrator was built with.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    // =========================================================================
    // Auto-Sync
    // =========================================================================

    /// Starts the auto-sync timer if configured and not already running.
    ///
    /// Must be called from within a tokio runtime. Returns whether a timer
    /// is running afterwards.
    pub fn enable_auto_sync(self: &Arc<Self>) -> bool {
        if !self.settings.auto_sync {
            debug!("Auto-sync disabled by configuration");
            return false;
        }

        let mut slot = self.auto_sync.lock();
        if slot.as_ref().is_some_and(AutoSyncTask::is_running) {
            return true;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "Cannot enable auto-sync outside a tokio runtime");
                return false;
            }
        };

        *slot = Some(AutoSyncTask::spawn(
            &runtime,
            Arc::downgrade(self),
            self.settings.interval(),
        ));
        true
    }

    /// Stops the auto-sync timer. A sync already running finishes.
    pub fn disable_auto_sync(&self) {
        if self.auto_sync.lock().take().is_some() {
            info!("Auto-sync disabled");
        }
    }

    /// Whether the auto-sync timer is running.
    pub fn is_auto_sync_enabled(&self) -> bool {
        self.auto_sync
            .lock()
            .as_ref()
            .is_some_and(AutoSyncTask::is_running)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn try_begin_full_sync(&self) -> Option<PhaseGuard<'_>> {
        let mut phase = self.phase.lock();
        if phase.is_syncing() {
            return None;
        }
        *phase = SyncPhase::Syncing;
        Some(PhaseGuard { phase: &self.phase })
    }

    fn collection_lock(&self, collection: &str) -> Arc<AsyncMutex<()>> {
        self.collection_locks
            .lock()
            .entry(collection.to_string())
            .or_default()
            .clone()
    }

    async fn locked_cycle(&self, collection: &str, since: i64) -> CollectionOutcome {
        let lock = self.collection_lock(collection);
        let _held = lock.lock().await;
        self.run_cycle(collection, since).await
    }

    /// Fetch, merge, persist, notify. Caller holds the collection lock.
    async fn run_cycle(&self, collection: &str, since: i64) -> CollectionOutcome {
        let updates = match self.fetcher.fetch_since(collection, since).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(
                    collection = %collection,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Fetch failed, no updates this cycle"
                );
                return CollectionOutcome::Failed {
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                };
            }
        };

        if updates.is_empty() {
            debug!(collection = %collection, "No updates");
            return CollectionOutcome::NoChanges;
        }

        // Merging into [] after a failed read would overwrite the stored set.
        let existing = match self.cache.try_get(collection).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(
                    collection = %collection,
                    error = %e,
                    "Failed to read cached collection, skipping merge"
                );
                return CollectionOutcome::Failed {
                    reason: e.to_string(),
                    retryable: true,
                };
            }
        };
        let (records, report) = merge_with_report(&existing, &updates);

        if let Err(e) = self.cache.try_put(collection, &records).await {
            error!(
                collection = %collection,
                error = %e,
                "Failed to persist merged collection"
            );
            return CollectionOutcome::Failed {
                reason: e.to_string(),
                retryable: true,
            };
        }

        let fetched = updates.len();
        let total = records.len();
        let change = CollectionChange {
            collection: collection.to_string(),
            updates,
            records,
        };
        let delivered = self.registry.notify(&change);

        info!(
            collection = %collection,
            fetched = fetched,
            inserted = report.inserted,
            updated = report.updated,
            stale = report.stale,
            removed = report.removed,
            total = total,
            listeners = delivered,
            "Collection synced"
        );

        CollectionOutcome::Merged {
            fetched,
            report,
            total,
        }
    }

    async fn advance_checkpoint(&self, cycle_start: i64) {
        let _held = self.checkpoint_write.lock().await;

        let previous = self.checkpoint.fetch_max(cycle_start, Ordering::SeqCst);
        if cycle_start <= previous {
            return;
        }

        if let Err(e) = self.cache.save_checkpoint(cycle_start).await {
            warn!(checkpoint = cycle_start, error = %e, "Failed to persist checkpoint");
        } else {
            debug!(checkpoint = cycle_start, "Checkpoint advanced");
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`SyncOrchestrator`].
pub struct SyncOrchestratorBuilder {
    settings: SyncSettings,
    cache: Option<Arc<CacheStore>>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    registry: Option<SubscriptionRegistry>,
}

impl SyncOrchestratorBuilder {
    /// Creates a new builder with the given settings.
    pub fn new(settings: SyncSettings) -> Self {
        SyncOrchestratorBuilder {
            settings,
            cache: None,
            fetcher: None,
            registry: None,
        }
    }

    /// Sets the cache store.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the remote fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Shares an existing registry instead of creating one.
    pub fn with_registry(mut self, registry: SubscriptionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the orchestrator, restoring the persisted checkpoint.
    ///
    /// Without a persisted checkpoint the first sync fetches full history.
    pub async fn build(self) -> SyncResult<Arc<SyncOrchestrator>> {
        let cache = self
            .cache
            .ok_or_else(|| SyncError::InvalidConfig("Cache store required".into()))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| SyncError::InvalidConfig("Remote fetcher required".into()))?;

        let checkpoint = cache.load_checkpoint().await.unwrap_or(0);
        info!(
            checkpoint = checkpoint,
            collections = ?self.settings.collections,
            auto_sync = self.settings.auto_sync,
            interval_ms = self.settings.interval_ms,
            "Sync orchestrator created"
        );

        Ok(Arc::new(SyncOrchestrator {
            settings: self.settings,
            cache,
            fetcher,
            registry: self.registry.unwrap_or_default(),
            checkpoint: AtomicI64::new(checkpoint),
            checkpoint_write: AsyncMutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
            collection_locks: Mutex::new(HashMap::new()),
            auto_sync: Mutex::new(None),
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
