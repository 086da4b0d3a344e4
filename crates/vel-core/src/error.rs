//! # Error Types
//!
//! Domain errors for vel-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vel-core   → CoreError   (record conversions)                         │
//! │  vel-cache  → CacheError  (substrate, migrations, serialization)       │
//! │  vel-sync   → SyncError   (config, transport, protocol)                │
//! │                                                                         │
//! │  Flow: CoreError / CacheError → SyncError → logged at the orchestrator │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while converting records between payload representations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record could not be encoded as JSON.
    #[error("Failed to serialize record {id}: {reason}")]
    Serialization { id: String, reason: String },

    /// A record does not fit the requested typed payload.
    ///
    /// ## When This Occurs
    /// - A field required by the typed payload is missing
    /// - A field has an unexpected JSON type
    #[error("Record {id} does not match the requested payload type: {reason}")]
    TypedView { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::TypedView {
            id: "wp-1".into(),
            reason: "missing field `title`".into(),
        };
        assert!(err.to_string().contains("wp-1"));
        assert!(err.to_string().contains("title"));
    }
}
