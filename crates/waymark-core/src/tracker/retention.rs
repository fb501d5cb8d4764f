//! Retention enforcement and per-tracker archival
//!
//! After an insert pushes a tracker's log over the configured limit, the
//! oldest excess records (by `(date, createdAt)` ascending, ties by insertion
//! order) are removed until the count equals the limit. Under the `archive`
//! strategy the removed records are appended to `tracker_archive_<id>`
//! (capped, oldest-trimmed) before being dropped. Archive writes are
//! best-effort: they never block or fail the active-log mutation.

use std::collections::HashSet;

use serde_json::Value;

use crate::model::Record;
use crate::storage::StorageBackend;

/// Total archive entries kept per tracker; older entries are trimmed first.
pub const ARCHIVE_CAP: usize = 50_000;

/// Storage key of a tracker's archive.
pub fn archive_key(tracker_id: &str) -> String {
    format!("tracker_archive_{tracker_id}")
}

/// Trim `records` down to `limit`, returning the removed records oldest
/// first. A zero limit disables retention.
pub(crate) fn enforce(records: &mut Vec<Record>, limit: usize) -> Vec<Record> {
    if limit == 0 || records.len() <= limit {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..records.len()).collect();
    // stable: insertion order breaks ties
    order.sort_by(|&a, &b| records[a].sort_key().cmp(&records[b].sort_key()));

    let remove_count = records.len() - limit;
    let removed_ids: HashSet<String> = order[..remove_count]
        .iter()
        .map(|&i| records[i].id.clone())
        .collect();

    let mut removed: Vec<Record> = order[..remove_count]
        .iter()
        .map(|&i| records[i].clone())
        .collect();
    removed.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    records.retain(|r| !removed_ids.contains(&r.id));
    removed
}

/// Append removed records to the tracker's archive, trimming to the cap.
///
/// Returns the number of records archived, or `None` when any step failed;
/// failures are logged and swallowed so the caller's mutation cannot be
/// affected.
pub(crate) fn archive(
    backend: &dyn StorageBackend,
    tracker_id: &str,
    removed: &[Record],
) -> Option<u64> {
    if removed.is_empty() {
        return Some(0);
    }
    let key = archive_key(tracker_id);

    let mut entries: Vec<Value> = match backend.get(&key) {
        Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Ok(None) => Vec::new(),
        Err(err) => {
            tracing::warn!("Archive read for {} failed: {}", tracker_id, err);
            return None;
        }
    };

    for record in removed {
        match serde_json::to_value(record) {
            Ok(value) => entries.push(value),
            Err(err) => tracing::warn!("Archive encode for {} failed: {}", tracker_id, err),
        }
    }
    if entries.len() > ARCHIVE_CAP {
        entries.drain(..entries.len() - ARCHIVE_CAP);
    }

    let payload = Value::Array(entries).to_string();
    match backend.set(&key, &payload) {
        Ok(()) => {
            tracing::debug!("Archived {} record(s) for {}", removed.len(), tracker_id);
            Some(removed.len() as u64)
        }
        Err(err) => {
            tracing::warn!("Archive write for {} failed: {}", tracker_id, err);
            None
        }
    }
}

/// Read a tracker's archive; unreadable or missing archives read as empty.
pub(crate) fn fetch(backend: &dyn StorageBackend, tracker_id: &str) -> Vec<Record> {
    match backend.get(&archive_key(tracker_id)) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<Record>>(&raw) {
            Ok(records) => records,
            Err(_) => Vec::new(),
        },
        _ => Vec::new(),
    }
}
