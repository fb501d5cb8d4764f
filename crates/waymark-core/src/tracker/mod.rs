//! Tracker Repository
//!
//! Owns tracker definitions and their append-only record logs: CRUD with
//! silent-no-op failure semantics, per-kind numeric coercion at the record
//! boundary, derived value aggregation, retention enforcement with optional
//! archival, home-surface selection, and the derived record index kept in
//! lock-step with every mutation.
//!
//! Persisted keys: `tracker_data` (versioned envelope, debounced),
//! `tracker_selected`, `tracker_retention`, `tracker_archive_meta`, and
//! `tracker_archive_<trackerId>` (all written eagerly).

mod index;
mod retention;

pub use index::{RecordIndex, TrackerBucket};
pub use retention::{archive_key, ARCHIVE_CAP};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::{
    coerce, default_trackers, Field, Record, RetentionConfig, RetentionStrategy, Tracker,
    TrackerKind, BUILTIN_FILTER_FIELDS,
};
use crate::storage::{
    envelope_payload, run_migrations, save_collection, Migration, Persister, StorageBackend,
    DEFAULT_DEBOUNCE,
};

// ============================================================================
// SCHEMA
// ============================================================================

/// Current tracker schema version: v0 legacy bare array, v1 adds
/// `valueFieldId`, v2 adds `createdAt` and normalizes field objects.
pub const TRACKER_SCHEMA_VERSION: u32 = 2;

pub const TRACKER_DATA_KEY: &str = "tracker_data";
pub const TRACKER_SELECTED_KEY: &str = "tracker_selected";
pub const TRACKER_RETENTION_KEY: &str = "tracker_retention";
pub const TRACKER_ARCHIVE_META_KEY: &str = "tracker_archive_meta";

/// Tracker migration table.
pub const TRACKER_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "infer valueFieldId from built-in kind or first field",
        up: migrate_infer_value_field,
    },
    Migration {
        version: 2,
        description: "backfill createdAt and normalize field objects",
        up: migrate_backfill_created_at,
    },
];

fn migrate_infer_value_field(items: &[Value]) -> Result<Vec<Value>, String> {
    items
        .iter()
        .map(|item| {
            let mut map = item
                .as_object()
                .cloned()
                .ok_or_else(|| "tracker item is not an object".to_string())?;
            let keep = matches!(map.get("valueFieldId"), Some(Value::String(s)) if !s.is_empty());
            if !keep {
                let inferred = match map.get("id").and_then(Value::as_str) {
                    Some("reading") => Value::String("pages".to_string()),
                    Some("expense") => Value::String("amount".to_string()),
                    Some("workout") => Value::String("time".to_string()),
                    Some("meditation") => Value::String("duration".to_string()),
                    _ => map
                        .get("fields")
                        .and_then(Value::as_array)
                        .and_then(|fields| fields.first())
                        .and_then(|f| f.get("id"))
                        .cloned()
                        .unwrap_or(Value::Null),
                };
                map.insert("valueFieldId".to_string(), inferred);
            }
            Ok(Value::Object(map))
        })
        .collect()
}

fn migrate_backfill_created_at(items: &[Value]) -> Result<Vec<Value>, String> {
    items
        .iter()
        .map(|item| {
            let mut map = item
                .as_object()
                .cloned()
                .ok_or_else(|| "tracker item is not an object".to_string())?;
            map.entry("createdAt")
                .or_insert_with(|| Value::String(coerce::now_iso()));
            let fields = map
                .get("fields")
                .and_then(Value::as_array)
                .map(|fields| fields.iter().map(normalize_field).collect())
                .unwrap_or_default();
            map.insert("fields".to_string(), Value::Array(fields));
            Ok(Value::Object(map))
        })
        .collect()
}

/// Rewrite a legacy field object to exactly `{id, label, unit, inherited}`:
/// `label` falls back to the field id, `unit` to the empty string, and
/// `inherited` becomes a real boolean.
fn normalize_field(field: &Value) -> Value {
    let empty = Map::new();
    let obj = field.as_object().unwrap_or(&empty);
    let mut out = Map::new();
    if let Some(id) = obj.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    let label = match obj.get("label") {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => obj.get("id").cloned(),
    };
    if let Some(label) = label {
        out.insert("label".to_string(), label);
    }
    let unit = match obj.get("unit") {
        Some(v) if coerce::truthy(v) => v.clone(),
        _ => Value::String(String::new()),
    };
    out.insert("unit".to_string(), unit);
    let inherited = obj.get("inherited").map(coerce::truthy).unwrap_or(false);
    out.insert("inherited".to_string(), Value::Bool(inherited));
    Value::Object(out)
}

// ============================================================================
// PATCHES
// ============================================================================

/// Partial update for a tracker definition. `filter_field` is doubly
/// optional: `Some(None)` explicitly clears it.
#[derive(Debug, Clone, Default)]
pub struct TrackerPatch {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub unit: Option<String>,
    pub fields: Option<Vec<Field>>,
    pub filter_field: Option<Option<String>>,
    pub value_field_id: Option<String>,
}

/// Partial update for the process-wide retention config.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPatch {
    pub per_tracker_limit: Option<usize>,
    pub strategy: Option<RetentionStrategy>,
}

/// Derived reading-tracker statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingStats {
    pub total_pages: f64,
    pub total_minutes: f64,
    pub pages_per_hour: f64,
}

// ============================================================================
// VALUE AGGREGATION
// ============================================================================

/// The aggregation rule for a tracker's cached `value`.
///
/// With a `valueFieldId`, sums that field over all records (non-numeric
/// contributes zero). Otherwise falls back to the built-in kind's legacy
/// field. Custom trackers with neither yield `None` - the cached value is
/// left unchanged (known quirk, preserved).
pub fn aggregate_value(tracker: &Tracker) -> Option<f64> {
    let field = tracker
        .value_field()
        .or_else(|| tracker.kind().legacy_value_field())?;
    Some(
        tracker
            .records
            .iter()
            .map(|r| r.numeric_field(field))
            .sum(),
    )
}

/// One record's contribution under the tracker's value rule.
///
/// Unlike [`aggregate_value`], a declared value field absent from this
/// particular record falls back to the built-in kind's legacy field, so
/// mixed-era record logs still contribute.
pub fn record_value(tracker: &Tracker, record: &Record) -> f64 {
    if let Some(field) = tracker.value_field() {
        if record.rest.contains_key(field) {
            return record.numeric_field(field);
        }
    }
    match tracker.kind().legacy_value_field() {
        Some(field) => record.numeric_field(field),
        None => 0.0,
    }
}

fn recompute_value(tracker: &mut Tracker) {
    if let Some(value) = aggregate_value(tracker) {
        tracker.value = value;
    }
}

// ============================================================================
// TRACKER STORE
// ============================================================================

/// Repository over trackers, their record logs, selection, and retention.
///
/// All mutations apply to in-memory state synchronously; persistence of
/// `tracker_data` is debounced (last-write-wins), the smaller keys are
/// written eagerly. Invalid mutation input is a logged silent no-op, never
/// an error - mutations are fire-and-forget from the caller's perspective.
pub struct TrackerStore {
    backend: Arc<dyn StorageBackend>,
    persister: Persister,
    trackers: Vec<Tracker>,
    selected: Vec<String>,
    retention: RetentionConfig,
    archived_counts: BTreeMap<String, u64>,
    index: RecordIndex,
    hydrated: bool,
    error: Option<String>,
}

impl TrackerStore {
    /// Create a store seeded with the default trackers; call
    /// [`hydrate`](Self::hydrate) to load persisted state over them.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let trackers = default_trackers();
        let selected = trackers.iter().map(|t| t.id.clone()).collect();
        let index = RecordIndex::rebuild_from(&trackers);
        let persister = Persister::new(Arc::clone(&backend), DEFAULT_DEBOUNCE);
        TrackerStore {
            backend,
            persister,
            trackers,
            selected,
            retention: RetentionConfig::default(),
            archived_counts: BTreeMap::new(),
            index,
            hydrated: false,
            error: None,
        }
    }

    // ── Hydration ─────────────────────────────────────────────────────

    /// Load and migrate persisted state. Unreadable storage keeps the
    /// current (default) state and records a collection-level error; calling
    /// `hydrate` again is the retry entry point.
    pub fn hydrate(&mut self) {
        self.error = None;

        let reads = (
            self.backend.get(TRACKER_DATA_KEY),
            self.backend.get(TRACKER_SELECTED_KEY),
            self.backend.get(TRACKER_RETENTION_KEY),
            self.backend.get(TRACKER_ARCHIVE_META_KEY),
        );
        let (data, selected, retention, meta) = match reads {
            (Ok(a), Ok(b), Ok(c), Ok(d)) => (a, b, c, d),
            _ => {
                tracing::warn!("Failed to hydrate trackers: storage unreadable");
                self.error = Some("Could not load trackers".to_string());
                self.hydrated = true;
                return;
            }
        };

        if let Some(raw) = data {
            let loaded = crate::storage::parse_envelope(&raw);
            let stored_version = loaded.version;
            let (items, version) = run_migrations(
                loaded.items,
                stored_version,
                TRACKER_SCHEMA_VERSION,
                TRACKER_MIGRATIONS,
            );
            self.trackers = crate::storage::decode_items(items, "tracker");
            if version != stored_version {
                // persist the upgraded structure right away
                if let Err(err) =
                    save_collection(self.backend.as_ref(), TRACKER_DATA_KEY, &self.trackers, version)
                {
                    tracing::warn!("Failed to persist migrated trackers: {}", err);
                }
            }
        }

        if let Some(raw) = selected {
            if let Ok(ids) = serde_json::from_str::<Vec<String>>(&raw) {
                self.selected = ids;
            }
        }
        if let Some(raw) = retention {
            if let Ok(mut config) = serde_json::from_str::<RetentionConfig>(&raw) {
                config.normalize();
                self.retention = config;
            }
        }
        if let Some(raw) = meta {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw) {
                self.archived_counts = map
                    .into_iter()
                    .filter_map(|(k, v)| v.as_u64().map(|n| (k, n)))
                    .collect();
            }
        }

        self.index = RecordIndex::rebuild_from(&self.trackers);
        self.hydrated = true;
    }

    // ── Tracker CRUD ──────────────────────────────────────────────────

    /// Add a tracker. Missing optional pieces default: id assigned, a
    /// `primary` field synthesized from the unit, `valueFieldId` derived
    /// from the first field.
    pub fn add_tracker(&mut self, mut tracker: Tracker) {
        if tracker.id.is_empty() {
            tracker.id = Uuid::new_v4().to_string();
        }
        if tracker.fields.is_empty() && !tracker.unit.is_empty() {
            tracker.fields = vec![Field {
                id: "primary".to_string(),
                label: tracker.title.clone(),
                unit: tracker.unit.clone(),
                inherited: false,
            }];
        }
        if tracker.value_field().is_none() {
            tracker.value_field_id = tracker.first_field_id();
        }
        self.index.clear_tracker(&tracker.id);
        for record in &tracker.records {
            self.index.insert(&tracker.id, record.clone());
        }
        self.trackers.push(tracker);
        self.persist_trackers();
    }

    /// Merge a patch into a tracker, repairing `filterField` and
    /// `valueFieldId` when a field edit leaves them dangling.
    pub fn update_tracker(&mut self, tracker_id: &str, patch: TrackerPatch) {
        let Some(tracker) = self.trackers.iter_mut().find(|t| t.id == tracker_id) else {
            tracing::debug!("update_tracker: unknown tracker {}", tracker_id);
            return;
        };

        if let Some(fields) = patch.fields {
            tracker.fields = fields;
        }

        let mut filter_field = match patch.filter_field {
            Some(explicit) => explicit,
            None => tracker.filter_field.clone(),
        };
        if let Some(f) = &filter_field {
            if !tracker.has_field(f) && !BUILTIN_FILTER_FIELDS.contains(&f.as_str()) {
                filter_field = None;
            }
        }
        tracker.filter_field = filter_field;

        if let Some(explicit) = patch.value_field_id {
            tracker.value_field_id = Some(explicit);
        } else {
            match tracker.value_field() {
                Some(current) if !tracker.has_field(current) => {
                    tracker.value_field_id = tracker.first_field_id();
                }
                None => tracker.value_field_id = tracker.first_field_id(),
                _ => {}
            }
        }

        if let Some(title) = patch.title {
            tracker.title = title;
        }
        if let Some(icon) = patch.icon {
            tracker.icon = icon;
        }
        if let Some(color) = patch.color {
            tracker.color = color;
        }
        if let Some(unit) = patch.unit {
            tracker.unit = unit;
        }

        self.persist_trackers();
    }

    // ── Home-surface selection ────────────────────────────────────────

    /// Show a tracker on the home surface.
    pub fn add_to_home(&mut self, tracker_id: &str) {
        if !self.selected.iter().any(|id| id == tracker_id) {
            self.selected.push(tracker_id.to_string());
            self.persist_selected();
        }
    }

    /// Remove a tracker from the home surface and clear its logged data.
    pub fn remove_from_home(&mut self, tracker_id: &str) {
        self.selected.retain(|id| id != tracker_id);
        if let Some(tracker) = self.trackers.iter_mut().find(|t| t.id == tracker_id) {
            tracker.records.clear();
            tracker.value = 0.0;
            self.index.clear_tracker(tracker_id);
        }
        self.persist_selected();
        self.persist_trackers();
    }

    // ── Record mutations ──────────────────────────────────────────────

    /// Append a record. Assigns id/date/createdAt defaults, applies the
    /// built-in kind's numeric coercion, recomputes the tracker value,
    /// enforces retention, and mirrors the index.
    pub fn add_record(&mut self, tracker_id: &str, payload: Record) {
        let config = self.retention;
        let Some(pos) = self.trackers.iter().position(|t| t.id == tracker_id) else {
            tracing::debug!("add_record: unknown tracker {}", tracker_id);
            return;
        };

        let mut record = payload;
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if record.date.is_empty() {
            record.date = coerce::day_string(coerce::today());
        }
        if record.created_at.is_empty() {
            record.created_at = coerce::now_iso();
        }
        for field in TrackerKind::from_id(tracker_id).numeric_fields() {
            record.coerce_numeric(field);
        }

        let removed = {
            let tracker = &mut self.trackers[pos];
            tracker.records.push(record.clone());
            let removed = retention::enforce(&mut tracker.records, config.per_tracker_limit);
            recompute_value(tracker);
            removed
        };

        self.index.insert(tracker_id, record);
        for gone in &removed {
            self.index.remove(tracker_id, &gone.id);
        }

        if config.strategy == RetentionStrategy::Archive && !removed.is_empty() {
            if let Some(n) = retention::archive(self.backend.as_ref(), tracker_id, &removed) {
                *self
                    .archived_counts
                    .entry(tracker_id.to_string())
                    .or_insert(0) += n;
                self.persist_archive_meta();
            }
        }

        self.persist_trackers();
    }

    /// Merge a patch into a record; silent no-op if tracker or record is
    /// unknown. The record id is identity and cannot be patched.
    pub fn update_record(&mut self, tracker_id: &str, record_id: &str, patch: &Map<String, Value>) {
        let Some(tracker) = self.trackers.iter_mut().find(|t| t.id == tracker_id) else {
            tracing::debug!("update_record: unknown tracker {}", tracker_id);
            return;
        };
        let Some(record) = tracker.records.iter_mut().find(|r| r.id == record_id) else {
            tracing::debug!("update_record: unknown record {}/{}", tracker_id, record_id);
            return;
        };
        record.merge(patch);
        let updated = record.clone();
        recompute_value(tracker);
        self.index.update(tracker_id, updated);
        self.persist_trackers();
    }

    /// Remove a record from the active log. Callers wanting undo must retain
    /// their own copy; see [`restore_record`](Self::restore_record).
    pub fn delete_record(&mut self, tracker_id: &str, record_id: &str) {
        let Some(tracker) = self.trackers.iter_mut().find(|t| t.id == tracker_id) else {
            tracing::debug!("delete_record: unknown tracker {}", tracker_id);
            return;
        };
        let before = tracker.records.len();
        tracker.records.retain(|r| r.id != record_id);
        if tracker.records.len() == before {
            return;
        }
        recompute_value(tracker);
        self.index.remove(tracker_id, record_id);
        self.persist_trackers();
    }

    /// Re-insert a previously removed record verbatim. Idempotent: a no-op
    /// when the id is already present.
    pub fn restore_record(&mut self, tracker_id: &str, record: Record) {
        if record.id.is_empty() {
            return;
        }
        let Some(tracker) = self.trackers.iter_mut().find(|t| t.id == tracker_id) else {
            tracing::debug!("restore_record: unknown tracker {}", tracker_id);
            return;
        };
        if tracker.records.iter().any(|r| r.id == record.id) {
            return;
        }
        tracker.records.push(record.clone());
        recompute_value(tracker);
        self.index.insert(tracker_id, record);
        self.persist_trackers();
    }

    // ── Retention & archive ───────────────────────────────────────────

    /// Update the retention config (clamped) and persist it eagerly. Applies
    /// to future inserts; existing logs are not retro-trimmed.
    pub fn update_retention(&mut self, patch: RetentionPatch) {
        if let Some(limit) = patch.per_tracker_limit {
            self.retention.per_tracker_limit = limit;
        }
        if let Some(strategy) = patch.strategy {
            self.retention.strategy = strategy;
        }
        self.retention.normalize();
        match serde_json::to_string(&self.retention) {
            Ok(payload) => self.persister.write_now(TRACKER_RETENTION_KEY, &payload),
            Err(err) => tracing::warn!("Failed to encode retention config: {}", err),
        }
    }

    /// Number of records ever archived for a tracker.
    pub fn archived_count(&self, tracker_id: &str) -> u64 {
        self.archived_counts.get(tracker_id).copied().unwrap_or(0)
    }

    /// Read a tracker's archive; unreadable archives read as empty.
    pub fn fetch_archive(&self, tracker_id: &str) -> Vec<Record> {
        retention::fetch(self.backend.as_ref(), tracker_id)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn tracker(&self, tracker_id: &str) -> Option<&Tracker> {
        self.trackers.iter().find(|t| t.id == tracker_id)
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn retention(&self) -> RetentionConfig {
        self.retention
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated
    }

    /// Non-fatal hydration error, if any ("could not load" banner text).
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Records for a tracker sorted by `(date, createdAt)` ascending,
    /// served from the index.
    pub fn records_sorted(&self, tracker_id: &str) -> Vec<Record> {
        match self.index.bucket(tracker_id) {
            Some(bucket) => bucket.sorted(),
            None => self
                .tracker(tracker_id)
                .map(|t| t.records.clone())
                .unwrap_or_default(),
        }
    }

    /// Derived stats over the reading tracker.
    pub fn reading_stats(&self) -> ReadingStats {
        let records = self.records_sorted("reading");
        let mut stats = ReadingStats::default();
        for record in &records {
            stats.total_pages += record.numeric_field("pages");
            stats.total_minutes += record.numeric_field("duration");
        }
        if stats.total_minutes > 0.0 {
            stats.pages_per_hour = stats.total_pages / (stats.total_minutes / 60.0);
        }
        stats
    }

    #[cfg(test)]
    pub(crate) fn index(&self) -> &RecordIndex {
        &self.index
    }

    /// Force any pending debounced write to land now (shutdown/tests).
    pub fn flush(&self) {
        self.persister.flush();
    }

    // ── Persistence ───────────────────────────────────────────────────

    fn persist_trackers(&self) {
        if !self.hydrated {
            return;
        }
        match envelope_payload(&self.trackers, TRACKER_SCHEMA_VERSION) {
            Ok(payload) => self.persister.schedule(TRACKER_DATA_KEY, payload),
            Err(err) => tracing::warn!("Failed to encode trackers: {}", err),
        }
    }

    fn persist_selected(&self) {
        if !self.hydrated {
            return;
        }
        match serde_json::to_string(&self.selected) {
            Ok(payload) => self.persister.write_now(TRACKER_SELECTED_KEY, &payload),
            Err(err) => tracing::warn!("Failed to encode selection: {}", err),
        }
    }

    fn persist_archive_meta(&self) {
        match serde_json::to_string(&self.archived_counts) {
            Ok(payload) => self.persister.write_now(TRACKER_ARCHIVE_META_KEY, &payload),
            Err(err) => tracing::warn!("Failed to encode archive meta: {}", err),
        }
    }
}
