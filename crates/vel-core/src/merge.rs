//! # Merge Engine
//!
//! Version-aware reconciliation of a cached record set with incoming updates.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Last-Writer-Wins-By-Version                          │
//! │                                                                         │
//! │  for each incoming record u:                                           │
//! │      no cached record with u.id      → append u        (insert)        │
//! │      cached e, u.version > e.version → replace e by u  (update)        │
//! │      cached e, u.version <= e.version → drop u          (stale)         │
//! │                                                                         │
//! │  finally: drop every record with deleted == true       (compaction)    │
//! │                                                                         │
//! │  Order of the result: cached order (replacements in place), then       │
//! │  insertions in arrival order.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Versions, not wall-clock times, decide conflicts, so clock skew between
//! writers cannot reorder updates. Merging is idempotent and, per identifier,
//! independent of the order updates arrive in.

use std::collections::HashMap;

use crate::record::Record;

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Updates whose id was not cached yet.
    pub inserted: usize,
    /// Updates that replaced an older cached version.
    pub updated: usize,
    /// Updates discarded because the cached version was the same or newer.
    pub stale: usize,
    /// Records removed by tombstone compaction.
    pub removed: usize,
}

impl MergeReport {
    /// Returns true if the merge changed the record set.
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.removed > 0
    }
}

/// Merges `updates` into `existing` and returns the new authoritative set.
pub fn merge<P: Clone>(existing: &[Record<P>], updates: &[Record<P>]) -> Vec<Record<P>> {
    merge_with_report(existing, updates).0
}

/// Same as [`merge`], also returning a [`MergeReport`].
pub fn merge_with_report<P: Clone>(
    existing: &[Record<P>],
    updates: &[Record<P>],
) -> (Vec<Record<P>>, MergeReport) {
    let mut merged: Vec<Record<P>> = existing.to_vec();
    let mut report = MergeReport::default();

    // First occurrence wins the index, matching a linear scan by id.
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.len() + updates.len());
    for (idx, record) in merged.iter().enumerate() {
        positions.entry(record.id.clone()).or_insert(idx);
    }

    for update in updates {
        match positions.get(&update.id) {
            Some(&idx) => {
                if update.version > merged[idx].version {
                    merged[idx] = update.clone();
                    report.updated += 1;
                } else {
                    report.stale += 1;
                }
            }
            None => {
                positions.insert(update.id.clone(), merged.len());
                merged.push(update.clone());
                report.inserted += 1;
            }
        }
    }

    let before = merged.len();
    merged.retain(|record| !record.deleted);
    report.removed = before - merged.len();

    (merged, report)
}

/// Replaces (or appends) a single record regardless of version, then
/// compacts tombstones.
///
/// Used for force-refreshes where the backend's copy of one entity is taken
/// as-is.
pub fn overwrite<P: Clone>(existing: &[Record<P>], record: Record<P>) -> Vec<Record<P>> {
    let mut merged: Vec<Record<P>> = existing.to_vec();
    match merged.iter().position(|r| r.id == record.id) {
        Some(idx) => merged[idx] = record,
        None => merged.push(record),
    }
    merged.retain(|r| !r.deleted);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::json;

    fn rec(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn sample_sets() -> Vec<(Vec<Record>, Vec<Record>)> {
        vec![
            (
                vec![rec(json!({"id": "a", "version": 1, "title": "old"}))],
                vec![
                    rec(json!({"id": "a", "version": 2, "title": "new"})),
                    rec(json!({"id": "b", "version": 1, "title": "fresh"})),
                ],
            ),
            (
                vec![rec(json!({"id": "a", "version": 3}))],
                vec![rec(json!({"id": "a", "version": 1}))],
            ),
            (
                vec![
                    rec(json!({"id": "a", "version": 1})),
                    rec(json!({"id": "b", "version": 5})),
                ],
                vec![
                    rec(json!({"id": "a", "version": 2, "deleted": true})),
                    rec(json!({"id": "c", "version": 1})),
                    rec(json!({"id": "c", "version": 4, "title": "later"})),
                    rec(json!({"id": "b", "version": 5, "title": "same version"})),
                ],
            ),
            (
                vec![],
                vec![
                    rec(json!({"id": "x", "version": 7, "deleted": true})),
                    rec(json!({"id": "x", "version": 2})),
                ],
            ),
        ]
    }

    #[test]
    fn test_insert_and_update() {
        let existing = vec![rec(json!({"id": "a", "version": 1, "title": "old"}))];
        let updates = vec![
            rec(json!({"id": "a", "version": 2, "title": "new"})),
            rec(json!({"id": "b", "version": 1, "title": "fresh"})),
        ];

        let merged = merge(&existing, &updates);

        assert_eq!(
            merged,
            vec![
                rec(json!({"id": "a", "version": 2, "title": "new"})),
                rec(json!({"id": "b", "version": 1, "title": "fresh"})),
            ]
        );
    }

    #[test]
    fn test_stale_update_is_discarded() {
        let existing = vec![rec(json!({"id": "a", "version": 3, "title": "keep"}))];
        let updates = vec![rec(json!({"id": "a", "version": 1, "title": "stale"}))];

        let (merged, report) = merge_with_report(&existing, &updates);

        assert_eq!(merged, existing);
        assert_eq!(report.stale, 1);
        assert!(!report.changed());
    }

    #[test]
    fn test_tombstone_removes_record() {
        let existing = vec![rec(json!({"id": "a", "version": 1}))];
        let updates = vec![rec(json!({"id": "a", "version": 2, "deleted": true}))];

        let (merged, report) = merge_with_report(&existing, &updates);

        assert!(merged.is_empty());
        assert_eq!(report.updated, 1);
        assert_eq!(report.removed, 1);
    }

    #[test]
    fn test_equal_version_keeps_cached_copy() {
        let existing = vec![rec(json!({"id": "a", "version": 2, "title": "cached"}))];
        let updates = vec![rec(json!({"id": "a", "version": 2, "title": "incoming"}))];

        assert_eq!(merge(&existing, &updates), existing);
    }

    #[test]
    fn test_merge_is_idempotent() {
        for (existing, updates) in sample_sets() {
            let once = merge(&existing, &updates);
            let twice = merge(&once, &updates);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_versions_never_regress() {
        for (existing, updates) in sample_sets() {
            let merged = merge(&existing, &updates);
            for record in &merged {
                if let Some(old) = existing.iter().find(|r| r.id == record.id) {
                    assert!(record.version >= old.version);
                }
                for incoming in updates.iter().filter(|u| u.id == record.id) {
                    assert!(record.version >= incoming.version);
                }
            }
        }
    }

    #[test]
    fn test_no_tombstones_survive() {
        for (existing, updates) in sample_sets() {
            assert!(merge(&existing, &updates).iter().all(|r| !r.deleted));
        }
    }

    #[test]
    fn test_update_order_does_not_change_final_state() {
        let existing = vec![rec(json!({"id": "a", "version": 1}))];
        let forward = vec![
            rec(json!({"id": "a", "version": 2, "title": "two"})),
            rec(json!({"id": "a", "version": 3, "title": "three"})),
        ];
        let backward: Vec<Record> = forward.iter().rev().cloned().collect();

        assert_eq!(merge(&existing, &forward), merge(&existing, &backward));
    }

    #[test]
    fn test_overwrite_ignores_version() {
        let existing = vec![
            rec(json!({"id": "a", "version": 9, "title": "cached"})),
            rec(json!({"id": "b", "version": 1})),
        ];

        let merged = overwrite(&existing, rec(json!({"id": "a", "version": 4, "title": "server"})));
        assert_eq!(merged[0].version, 4);
        assert_eq!(merged[0].field("title"), Some(&json!("server")));

        let merged = overwrite(&merged, Record::tombstone("b", 2));
        assert_eq!(merged.len(), 1);

        let merged = overwrite(&merged, Record::new("c", 1));
        assert_eq!(merged.last().map(|r| r.id.as_str()), Some("c"));
    }
}
