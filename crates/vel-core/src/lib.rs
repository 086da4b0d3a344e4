//! # vel-core: Pure Types and Merge Engine
//!
//! This crate holds everything about content synchronization that can be
//! expressed without I/O: the record envelope, the version-aware merge, and
//! the status types reported to the frontend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Vel Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                vel-sync (orchestrator, fetcher)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ vel-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐     ┌───────────┐     ┌───────────────┐        │   │
//! │  │   │  record   │     │   merge   │     │    status     │        │   │
//! │  │   │  Record   │     │  merge()  │     │  SyncStatus   │        │   │
//! │  │   │  Payload  │     │  report   │     │  SyncPhase    │        │   │
//! │  │   └───────────┘     └───────────┘     └───────────────┘        │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                vel-cache (local cache store)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use vel_core::{merge, Record};
//!
//! let existing = vec![Record::new("a", 1).with_field("title", "old")];
//! let updates = vec![
//!     Record::new("a", 2).with_field("title", "new"),
//!     Record::new("b", 1).with_field("title", "fresh"),
//! ];
//!
//! let merged = merge(&existing, &updates);
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged[0].version, 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod merge;
pub mod record;
pub mod status;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use merge::{merge, merge_with_report, overwrite, MergeReport};
pub use record::{Payload, Record};
pub use status::{SyncPhase, SyncStatus};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Collections managed when no explicit list is configured.
pub const DEFAULT_COLLECTIONS: [&str; 7] = [
    "banners",
    "wallpapers",
    "media",
    "sparkles",
    "photos",
    "ai_chats",
    "categories",
];

/// Default auto-sync polling interval (one minute).
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;
