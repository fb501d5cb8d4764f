//! Tracker - a user-defined category of logged activity
//!
//! Trackers declare their fields and value semantics, own an append-only
//! record log, and cache a derived aggregate (`value`) recomputed on every
//! record mutation. Four built-in kinds (reading, expense, workout,
//! meditation) carry legacy value-field fallbacks and the numeric coercion
//! applied at record creation.

use serde::{Deserialize, Serialize};

use super::record::Record;

// ============================================================================
// TRACKER KINDS
// ============================================================================

/// Built-in tracker kinds, recognised by their fixed ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerKind {
    Reading,
    Expense,
    Workout,
    Meditation,
    /// Any user-created tracker.
    Custom,
}

impl TrackerKind {
    /// Classify a tracker by its id.
    pub fn from_id(id: &str) -> Self {
        match id {
            "reading" => TrackerKind::Reading,
            "expense" => TrackerKind::Expense,
            "workout" => TrackerKind::Workout,
            "meditation" => TrackerKind::Meditation,
            _ => TrackerKind::Custom,
        }
    }

    /// Legacy aggregation field used when a tracker has no `valueFieldId`.
    pub fn legacy_value_field(&self) -> Option<&'static str> {
        match self {
            TrackerKind::Reading => Some("pages"),
            TrackerKind::Expense => Some("amount"),
            TrackerKind::Workout => Some("time"),
            TrackerKind::Meditation => Some("duration"),
            TrackerKind::Custom => None,
        }
    }

    /// Fields coerced to numbers at the record-creation boundary.
    pub fn numeric_fields(&self) -> &'static [&'static str] {
        match self {
            TrackerKind::Reading => &["pages", "duration"],
            TrackerKind::Expense => &["amount"],
            TrackerKind::Workout => &["sets", "reps", "time"],
            TrackerKind::Meditation => &["duration"],
            TrackerKind::Custom => &[],
        }
    }
}

// ============================================================================
// FIELDS
// ============================================================================

/// A declared field on a tracker. `id` is unique within the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit: String,
    /// True for fields copied from a template rather than declared directly.
    #[serde(default)]
    pub inherited: bool,
}

impl Field {
    pub fn new(id: &str, label: &str, unit: &str) -> Self {
        Field {
            id: id.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            inherited: false,
        }
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// A tracker definition plus its active record log.
///
/// `value` is a derived cache of the aggregation rule over `records`; the
/// repository recomputes it on every record mutation. `value_field_id`, when
/// set, must name a declared field - the repository repairs it whenever a
/// field edit leaves it dangling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Field used to group records in detail views; `None` when unset.
    #[serde(default)]
    pub filter_field: Option<String>,
    /// Field summed into `value`; `None` falls back to the built-in kind rule.
    #[serde(default)]
    pub value_field_id: Option<String>,
    /// Derived aggregate over `records` (cached).
    #[serde(default, deserialize_with = "super::coerce::lenient_f64")]
    pub value: f64,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

impl Tracker {
    pub fn kind(&self) -> TrackerKind {
        TrackerKind::from_id(&self.id)
    }

    /// The effective value field, ignoring empty strings left by legacy data.
    pub fn value_field(&self) -> Option<&str> {
        self.value_field_id.as_deref().filter(|f| !f.is_empty())
    }

    pub fn has_field(&self, field_id: &str) -> bool {
        self.fields.iter().any(|f| f.id == field_id)
    }

    pub fn first_field_id(&self) -> Option<String> {
        self.fields.first().map(|f| f.id.clone())
    }
}

/// Filter-field names the built-in detail screens understand even when no
/// matching field is declared; tracker edits never null these out.
pub(crate) const BUILTIN_FILTER_FIELDS: &[&str] =
    &["title", "category", "payType", "workoutType", "satisfaction"];

/// The four seed trackers installed on a fresh install.
pub fn default_trackers() -> Vec<Tracker> {
    let seed = |id: &str, title: &str, icon: &str, unit: &str, color: &str, filter: &str, field: Field| {
        Tracker {
            id: id.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            unit: unit.to_string(),
            filter_field: Some(filter.to_string()),
            value_field_id: Some(field.id.clone()),
            fields: vec![field],
            ..Default::default()
        }
    };
    vec![
        seed("expense", "Expense", "\u{1F4B8}", "$", "#EF4444", "category", Field::new("amount", "Amount", "$")),
        seed("workout", "Workout", "\u{1F3CB}\u{FE0F}", "min", "#10B981", "workoutType", Field::new("time", "Time", "min")),
        seed("reading", "Reading", "\u{1F4D6}", "pages", "#F59E0B", "title", Field::new("pages", "Pages", "pages")),
        seed("meditation", "Meditation", "\u{1F9D8}", "min", "#A855F7", "satisfaction", Field::new("duration", "Duration", "min")),
    ]
}

// ============================================================================
// RETENTION CONFIG
// ============================================================================

/// What happens to records trimmed by retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionStrategy {
    /// Discard trimmed records.
    #[default]
    Prune,
    /// Move trimmed records to the per-tracker archive store.
    Archive,
}

impl RetentionStrategy {
    /// Parse a stored strategy name; anything unrecognised means prune.
    pub fn parse_name(s: &str) -> Self {
        match s {
            "archive" => RetentionStrategy::Archive,
            _ => RetentionStrategy::Prune,
        }
    }
}

impl<'de> Deserialize<'de> for RetentionStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RetentionStrategy::parse_name(&s))
    }
}

/// Process-wide record-log growth policy, persisted under `tracker_retention`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Active-log size cap per tracker, clamped to `1..=20000`.
    #[serde(default = "default_limit")]
    pub per_tracker_limit: usize,
    #[serde(default)]
    pub strategy: RetentionStrategy,
}

fn default_limit() -> usize {
    1000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            per_tracker_limit: default_limit(),
            strategy: RetentionStrategy::Prune,
        }
    }
}

impl RetentionConfig {
    /// Maximum accepted per-tracker limit; larger stored values are clamped.
    pub const MAX_PER_TRACKER_LIMIT: usize = 20_000;

    /// Clamp the limit into its valid range, restoring the default when a
    /// stored config carries zero.
    pub fn normalize(&mut self) {
        if self.per_tracker_limit == 0 {
            self.per_tracker_limit = default_limit();
        }
        self.per_tracker_limit = self.per_tracker_limit.min(Self::MAX_PER_TRACKER_LIMIT);
    }
}
