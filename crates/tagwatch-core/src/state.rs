// ABOUTME: In-memory last-known-state store mapping tag ids to their latest counter and sighting time.
// ABOUTME: Single-writer upsert with change detection, plus owned point-in-time snapshots for publishing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::parser::TagEvent;

/// Latest known status for one tag. Field names match the published
/// state file consumed by the query API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatus {
    pub last_cnt: i64,
    pub last_seen: String,
}

/// What an upsert did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First sighting of this tag id.
    Created,
    /// Counter differs from the last sighting; both fields overwritten.
    Changed { previous_cnt: i64 },
    /// Same counter re-sighted; only `last_seen` refreshed.
    Touched,
}

/// A complete, consistent, owned copy of per-tag status at a point in time.
/// Ordered so the serialized form is stable across publishes.
pub type TagSnapshot = BTreeMap<String, TagStatus>;

/// Mapping from tag id to latest status. Memory is bounded by the number
/// of distinct tag ids ever seen, not by event volume. Entries are never
/// deleted here; retention belongs to the external store.
#[derive(Debug, Default)]
pub struct StateStore {
    tags: HashMap<String, TagStatus>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one sighting in arrival order. Later arrivals always win,
    /// even when their timestamp string sorts earlier than the stored one.
    pub fn upsert(&mut self, event: &TagEvent) -> UpdateOutcome {
        match self.tags.get_mut(&event.tag_id) {
            Some(status) => {
                if status.last_cnt != event.cnt {
                    let previous_cnt = status.last_cnt;
                    status.last_cnt = event.cnt;
                    status.last_seen = event.timestamp.clone();
                    UpdateOutcome::Changed { previous_cnt }
                } else {
                    status.last_seen = event.timestamp.clone();
                    UpdateOutcome::Touched
                }
            }
            None => {
                self.tags.insert(
                    event.tag_id.clone(),
                    TagStatus {
                        last_cnt: event.cnt,
                        last_seen: event.timestamp.clone(),
                    },
                );
                UpdateOutcome::Created
            }
        }
    }

    pub fn get(&self, tag_id: &str) -> Option<&TagStatus> {
        self.tags.get(tag_id)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Owned point-in-time copy with no aliasing into the live map,
    /// safe to hand to the publisher or a concurrent reader.
    pub fn snapshot(&self) -> TagSnapshot {
        self.tags
            .iter()
            .map(|(id, status)| (id.clone(), status.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tag_id: &str, cnt: i64, timestamp: &str) -> TagEvent {
        TagEvent {
            tag_id: tag_id.to_string(),
            cnt,
            timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn first_sighting_creates() {
        let mut store = StateStore::new();
        let outcome = store.upsert(&event("abc", 1, "20240101000000.000"));
        assert_eq!(outcome, UpdateOutcome::Created);

        let status = store.get("abc").unwrap();
        assert_eq!(status.last_cnt, 1);
        assert_eq!(status.last_seen, "20240101000000.000");
    }

    #[test]
    fn counter_change_updates_both_fields() {
        let mut store = StateStore::new();
        store.upsert(&event("abc", 1, "20240101000000.000"));
        let outcome = store.upsert(&event("abc", 2, "20240101000001.000"));
        assert_eq!(outcome, UpdateOutcome::Changed { previous_cnt: 1 });

        let status = store.get("abc").unwrap();
        assert_eq!(status.last_cnt, 2);
        assert_eq!(status.last_seen, "20240101000001.000");
    }

    #[test]
    fn re_sighting_same_counter_touches() {
        let mut store = StateStore::new();
        store.upsert(&event("abc", 1, "20240101000000.000"));
        let outcome = store.upsert(&event("abc", 1, "20240101000001.000"));
        assert_eq!(outcome, UpdateOutcome::Touched);

        // Counter untouched, last_seen refreshed.
        let status = store.get("abc").unwrap();
        assert_eq!(status.last_cnt, 1);
        assert_eq!(status.last_seen, "20240101000001.000");
    }

    #[test]
    fn arrival_order_wins_over_timestamp_order() {
        let mut store = StateStore::new();
        store.upsert(&event("abc", 1, "20240101000009.000"));
        // A later arrival with a lexicographically earlier timestamp
        // (clock reset upstream) still overwrites.
        store.upsert(&event("abc", 2, "20240101000001.000"));

        let status = store.get("abc").unwrap();
        assert_eq!(status.last_cnt, 2);
        assert_eq!(status.last_seen, "20240101000001.000");
    }

    #[test]
    fn size_is_bounded_by_distinct_ids() {
        let mut store = StateStore::new();
        for i in 0..10_000 {
            let id = format!("tag{}", i % 5);
            store.upsert(&event(&id, i, "20240101000000.000"));
        }
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn snapshot_does_not_alias_live_state() {
        let mut store = StateStore::new();
        store.upsert(&event("abc", 1, "20240101000000.000"));
        let snap = store.snapshot();

        store.upsert(&event("abc", 2, "20240101000001.000"));
        store.upsert(&event("xyz", 5, "20240101000002.000"));

        assert_eq!(snap.len(), 1);
        assert_eq!(snap["abc"].last_cnt, 1);
    }

    #[test]
    fn snapshot_serializes_with_stable_field_names() {
        let mut store = StateStore::new();
        store.upsert(&event("abc", 7, "20240101000000.000"));

        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "abc": { "last_cnt": 7, "last_seen": "20240101000000.000" }
            })
        );
    }
}
