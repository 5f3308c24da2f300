use crate::{Shape, WindowId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    pub id: WindowId,
    /// Registration sequence number, the primary ordering key.
    #[serde(default)]
    pub seq: u64,
    pub shape: Shape,
    /// Caller-defined payload. Stored and forwarded, never inspected.
    #[serde(default)]
    pub meta_data: serde_json::Value,
    pub last_seen: DateTime<Utc>,
}

impl WindowRecord {
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_seen) > timeout
    }
}

/// The full set of known windows, as persisted under the shared key.
///
/// `windows` is kept sorted by `(seq, id)` so every observer of the same id
/// set computes the same positional order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub next_seq: u64,
    #[serde(default)]
    pub windows: Vec<WindowRecord>,
}

impl Registry {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.iter().map(|w| w.id).collect()
    }

    /// Hands out the next registration sequence number.
    pub fn allocate_seq(&mut self) -> u64 {
        let floor = self
            .windows
            .iter()
            .map(|w| w.seq.saturating_add(1))
            .max()
            .unwrap_or(0);
        let seq = self.next_seq.max(floor);
        self.next_seq = seq.saturating_add(1);
        seq
    }

    /// Inserts `record`, replacing any record with the same id.
    pub fn upsert(&mut self, record: WindowRecord) {
        self.next_seq = self.next_seq.max(record.seq.saturating_add(1));
        match self.windows.iter_mut().find(|w| w.id == record.id) {
            Some(existing) => *existing = record,
            None => self.windows.push(record),
        }
        self.sort();
    }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> {
        let index = self.windows.iter().position(|w| w.id == id)?;
        Some(self.windows.remove(index))
    }

    pub fn has_stale(&self, now: DateTime<Utc>, timeout: Duration, keep: WindowId) -> bool {
        self.windows
            .iter()
            .any(|w| w.id != keep && w.is_stale(now, timeout))
    }

    /// Drops every record other than `keep` whose `last_seen` is older than
    /// `timeout`, returning the ids removed.
    pub fn prune_stale(
        &mut self,
        now: DateTime<Utc>,
        timeout: Duration,
        keep: WindowId,
    ) -> Vec<WindowId> {
        let mut reaped = Vec::new();
        self.windows.retain(|w| {
            if w.id != keep && w.is_stale(now, timeout) {
                reaped.push(w.id);
                false
            } else {
                true
            }
        });
        reaped
    }

    /// Restores the invariants after loading a payload some other writer
    /// produced: unique ids (the freshest record wins) and `(seq, id)` order.
    pub fn normalize(&mut self) {
        self.windows.sort_by_key(|w| (w.id, Reverse(w.last_seen)));
        self.windows.dedup_by_key(|w| w.id);
        self.next_seq = self
            .windows
            .iter()
            .map(|w| w.seq.saturating_add(1))
            .fold(self.next_seq, u64::max);
        self.sort();
    }

    fn sort(&mut self) {
        self.windows.sort_by_key(|w| (w.seq, w.id));
    }
}

/// What changed between two snapshots, ignoring `last_seen` and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    pub added: Vec<WindowId>,
    pub removed: Vec<WindowId>,
    pub reshaped: Vec<WindowId>,
}

impl RegistryDiff {
    pub fn between(before: &[WindowRecord], after: &[WindowRecord]) -> Self {
        let previous: HashMap<WindowId, &Shape> =
            before.iter().map(|w| (w.id, &w.shape)).collect();
        let current: HashMap<WindowId, &Shape> = after.iter().map(|w| (w.id, &w.shape)).collect();

        let mut diff = Self::default();
        for window in after {
            match previous.get(&window.id) {
                None => diff.added.push(window.id),
                Some(shape) if **shape != window.shape => diff.reshaped.push(window.id),
                Some(_) => {}
            }
        }
        for window in before {
            if !current.contains_key(&window.id) {
                diff.removed.push(window.id);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.reshaped.is_empty()
    }

    pub fn membership_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, seq: u64, x: f64, last_seen: DateTime<Utc>) -> WindowRecord {
        WindowRecord {
            id: WindowId(id),
            seq,
            shape: Shape::new(x, 0.0, 800.0, 600.0),
            meta_data: json!({ "color": id }),
            last_seen,
        }
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_order() {
        let now = Utc::now();
        let mut registry = Registry::default();
        registry.upsert(record(0xb2, 1, 800.0, now));
        registry.upsert(record(0xa1, 0, 0.0, now));
        registry.upsert(record(0xb2, 1, 900.0, now));

        assert_eq!(registry.ids(), vec![WindowId(0xa1), WindowId(0xb2)]);
        assert_eq!(registry.get(WindowId(0xb2)).unwrap().shape.x, 900.0);
        assert_eq!(registry.next_seq, 2);
    }

    #[test]
    fn equal_sequence_numbers_fall_back_to_id_order() {
        let now = Utc::now();
        let mut left = Registry::default();
        left.upsert(record(9, 3, 0.0, now));
        left.upsert(record(4, 3, 0.0, now));

        let mut right = Registry::default();
        right.upsert(record(4, 3, 0.0, now));
        right.upsert(record(9, 3, 0.0, now));

        assert_eq!(left.ids(), right.ids());
        assert_eq!(left.ids(), vec![WindowId(4), WindowId(9)]);
    }

    #[test]
    fn allocate_seq_skips_past_existing_records() {
        let now = Utc::now();
        let mut registry = Registry {
            next_seq: 0,
            windows: vec![record(1, 7, 0.0, now)],
        };
        assert_eq!(registry.allocate_seq(), 8);
        assert_eq!(registry.allocate_seq(), 9);
    }

    #[test]
    fn prune_stale_keeps_own_record() {
        let now = Utc::now();
        let old = now - Duration::seconds(10);
        let mut registry = Registry::default();
        registry.upsert(record(1, 0, 0.0, old));
        registry.upsert(record(2, 1, 0.0, old));
        registry.upsert(record(3, 2, 0.0, now));

        assert!(registry.has_stale(now, Duration::seconds(1), WindowId(1)));
        let reaped = registry.prune_stale(now, Duration::seconds(1), WindowId(1));

        assert_eq!(reaped, vec![WindowId(2)]);
        assert_eq!(registry.ids(), vec![WindowId(1), WindowId(3)]);
        assert!(!registry.has_stale(now, Duration::seconds(1), WindowId(1)));
    }

    #[test]
    fn normalize_drops_duplicate_ids() {
        let now = Utc::now();
        let mut registry = Registry {
            next_seq: 0,
            windows: vec![
                record(5, 1, 10.0, now - Duration::seconds(3)),
                record(2, 0, 0.0, now),
                record(5, 1, 20.0, now),
            ],
        };
        registry.normalize();

        assert_eq!(registry.ids(), vec![WindowId(2), WindowId(5)]);
        assert_eq!(registry.get(WindowId(5)).unwrap().shape.x, 20.0);
        assert_eq!(registry.next_seq, 2);
    }

    #[test]
    fn sequence_numbers_saturate_at_the_top() {
        let now = Utc::now();
        let mut registry = Registry {
            next_seq: 0,
            windows: vec![record(1, u64::MAX, 0.0, now)],
        };
        registry.normalize();
        assert_eq!(registry.next_seq, u64::MAX);

        assert_eq!(registry.allocate_seq(), u64::MAX);
        registry.upsert(record(2, u64::MAX, 0.0, now));
        assert_eq!(registry.next_seq, u64::MAX);
        assert_eq!(registry.ids(), vec![WindowId(1), WindowId(2)]);
    }

    #[test]
    fn diff_ignores_last_seen() {
        let now = Utc::now();
        let before = vec![record(1, 0, 0.0, now), record(2, 1, 0.0, now)];
        let mut after = before.clone();
        after[0].last_seen = now + Duration::seconds(5);
        assert!(RegistryDiff::between(&before, &after).is_empty());

        after[1].shape.x = 100.0;
        after.push(record(3, 2, 0.0, now));
        after.remove(0);
        let diff = RegistryDiff::between(&before, &after);

        assert_eq!(diff.added, vec![WindowId(3)]);
        assert_eq!(diff.removed, vec![WindowId(1)]);
        assert_eq!(diff.reshaped, vec![WindowId(2)]);
        assert!(diff.membership_changed());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let now = Utc::now();
        let mut registry = Registry::default();
        registry.upsert(record(1, 0, 0.0, now));
        let value = serde_json::to_value(&registry).unwrap();

        assert!(value.get("nextSeq").is_some());
        assert!(value["windows"][0].get("metaData").is_some());
        assert!(value["windows"][0].get("lastSeen").is_some());
    }
}
