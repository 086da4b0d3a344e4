//! # Auto-Sync Timer
//!
//! Periodic full syncs while auto-sync is enabled.
//!
//! ## Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  enable      +interval      +2·interval     +3·interval                │
//! │    │             │               │               │                      │
//! │    ▼             ▼               ▼               ▼                      │
//! │  spawn ──────► tick ──────────► tick ──────────► tick ...               │
//! │                 │                │                                      │
//! │                 └─ spawn sync_all (fire-and-forget)                     │
//! │                                  └─ previous still Syncing?             │
//! │                                     → skipped, never queued             │
//! │                                                                         │
//! │  The task holds a Weak orchestrator: once the last Arc is dropped the   │
//! │  next tick ends the loop. disable_auto_sync aborts it at once.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::orchestrator::SyncOrchestrator;

/// Running auto-sync timer. Aborted on drop.
#[derive(Debug)]
pub(crate) struct AutoSyncTask {
    handle: JoinHandle<()>,
}

impl AutoSyncTask {
    /// Spawns the timer on the current runtime.
    pub(crate) fn spawn(
        runtime: &tokio::runtime::Handle,
        orchestrator: Weak<SyncOrchestrator>,
        period: Duration,
    ) -> Self {
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(orchestrator) = orchestrator.upgrade() else {
                    debug!("Orchestrator dropped, stopping auto-sync");
                    break;
                };

                tokio::spawn(async move {
                    orchestrator.sync_all().await;
                });
            }
        });

        info!(interval_ms = period.as_millis() as u64, "Auto-sync enabled");
        AutoSyncTask { handle }
    }

    /// Whether the timer loop is still alive.
    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AutoSyncTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
