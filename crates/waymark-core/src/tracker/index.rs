//! Record index - derived id lookup over the record logs
//!
//! Per tracker, `{by_id, all_ids}` mirrors the active record log after every
//! repository mutation: `all_ids` holds exactly the ids present in `by_id`
//! (no duplicates), and the index is rebuildable at any time from the
//! authoritative `records` collections.

use std::collections::HashMap;

use crate::model::{Record, Tracker};

/// Index bucket for one tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerBucket {
    by_id: HashMap<String, Record>,
    all_ids: Vec<String>,
}

impl TrackerBucket {
    fn insert(&mut self, record: Record) {
        if !self.by_id.contains_key(&record.id) {
            self.all_ids.push(record.id.clone());
        }
        self.by_id.insert(record.id.clone(), record);
    }

    fn remove(&mut self, record_id: &str) {
        if self.by_id.remove(record_id).is_some() {
            self.all_ids.retain(|id| id != record_id);
        }
    }

    pub fn len(&self) -> usize {
        self.all_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_ids.is_empty()
    }

    pub fn get(&self, record_id: &str) -> Option<&Record> {
        self.by_id.get(record_id)
    }

    /// Records sorted by `(date, createdAt)` ascending. The sort is stable,
    /// so equal keys keep insertion order.
    pub fn sorted(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .all_ids
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect();
        records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        records
    }
}

/// Derived lookup structure over all trackers' record logs.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    buckets: HashMap<String, TrackerBucket>,
}

impl RecordIndex {
    /// Full rebuild from the authoritative record logs. Used at hydration and
    /// whenever a bucket could be stale.
    pub fn rebuild_from(trackers: &[Tracker]) -> Self {
        let mut index = RecordIndex::default();
        for tracker in trackers {
            let bucket = index.buckets.entry(tracker.id.clone()).or_default();
            for record in &tracker.records {
                if !record.id.is_empty() {
                    bucket.insert(record.clone());
                }
            }
        }
        index
    }

    pub fn bucket(&self, tracker_id: &str) -> Option<&TrackerBucket> {
        self.buckets.get(tracker_id)
    }

    pub fn insert(&mut self, tracker_id: &str, record: Record) {
        self.buckets
            .entry(tracker_id.to_string())
            .or_default()
            .insert(record);
    }

    pub fn update(&mut self, tracker_id: &str, record: Record) {
        // same upsert path; update of an unknown id is a no-op at the
        // repository layer before we get here
        if let Some(bucket) = self.buckets.get_mut(tracker_id) {
            if bucket.by_id.contains_key(&record.id) {
                bucket.insert(record);
            }
        }
    }

    pub fn remove(&mut self, tracker_id: &str, record_id: &str) {
        if let Some(bucket) = self.buckets.get_mut(tracker_id) {
            bucket.remove(record_id);
        }
    }

    /// Drop every record for a tracker (tracker data cleared or deleted).
    pub fn clear_tracker(&mut self, tracker_id: &str) {
        self.buckets.insert(tracker_id.to_string(), TrackerBucket::default());
    }

    /// Structural consistency check against a tracker's active log: same
    /// membership, no duplicates, no orphans.
    pub fn mirrors(&self, tracker: &Tracker) -> bool {
        let bucket = match self.buckets.get(&tracker.id) {
            Some(b) => b,
            None => return tracker.records.is_empty(),
        };
        if bucket.all_ids.len() != bucket.by_id.len() || bucket.all_ids.len() != tracker.records.len()
        {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        for id in &bucket.all_ids {
            if !seen.insert(id) || !bucket.by_id.contains_key(id) {
                return false;
            }
        }
        tracker.records.iter().all(|r| bucket.by_id.contains_key(&r.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, date: &str, created_at: &str) -> Record {
        Record {
            id: id.into(),
            date: date.into(),
            created_at: created_at.into(),
            ..Default::default()
        }
    }

    #[test]
    fn insert_remove_keeps_membership_exact() {
        let mut index = RecordIndex::default();
        index.insert("t", record("a", "2024-01-01", "2024-01-01T08:00:00.000Z"));
        index.insert("t", record("b", "2024-01-02", "2024-01-02T08:00:00.000Z"));
        index.insert("t", record("a", "2024-01-01", "2024-01-01T09:00:00.000Z"));

        let bucket = index.bucket("t").unwrap();
        assert_eq!(bucket.len(), 2);

        index.remove("t", "a");
        assert_eq!(index.bucket("t").unwrap().len(), 1);
        index.remove("t", "a");
        assert_eq!(index.bucket("t").unwrap().len(), 1);
    }

    #[test]
    fn rebuild_matches_incremental() {
        let tracker = Tracker {
            id: "t".into(),
            records: vec![
                record("a", "2024-01-02", "2024-01-02T08:00:00.000Z"),
                record("b", "2024-01-01", "2024-01-01T08:00:00.000Z"),
            ],
            ..Default::default()
        };
        let rebuilt = RecordIndex::rebuild_from(std::slice::from_ref(&tracker));
        assert!(rebuilt.mirrors(&tracker));

        let mut incremental = RecordIndex::default();
        for r in &tracker.records {
            incremental.insert("t", r.clone());
        }
        assert_eq!(
            rebuilt.bucket("t").unwrap().sorted(),
            incremental.bucket("t").unwrap().sorted()
        );
    }

    #[test]
    fn sorted_orders_by_date_then_created_at() {
        let mut index = RecordIndex::default();
        index.insert("t", record("late", "2024-01-02", "2024-01-02T08:00:00.000Z"));
        index.insert("t", record("early", "2024-01-01", "2024-01-01T08:00:00.000Z"));
        index.insert("t", record("tie2", "2024-01-01", "2024-01-01T09:00:00.000Z"));

        let sorted = index.bucket("t").unwrap().sorted();
        let ids: Vec<&str> = sorted.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "tie2", "late"]);
    }

    #[test]
    fn dateless_records_sort_by_created_at() {
        let mut index = RecordIndex::default();
        let mut dateless = record("x", "", "2024-01-03T08:00:00.000Z");
        dateless.rest.insert("pages".into(), json!(5));
        index.insert("t", dateless);
        index.insert("t", record("y", "2024-01-01", "2024-01-01T08:00:00.000Z"));

        let sorted = index.bucket("t").unwrap().sorted();
        assert_eq!(sorted[0].id, "y");
        assert_eq!(sorted[1].id, "x");
    }
}
