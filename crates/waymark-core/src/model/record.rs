//! Record - one logged entry within a tracker
//!
//! Records are keyed by id, dated to a calendar day, and carry an arbitrary
//! set of extra fields (pages, amount, category, ...) that ride in a flattened
//! JSON map so legacy shapes survive round-trips untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::coerce;

/// One logged entry in a tracker's append-only log.
///
/// `id` is unique within its tracker and immutable once created. `date` is the
/// calendar day (`YYYY-MM-DD`); `created_at` is the full creation timestamp.
/// All remaining typed fields live in [`Record::rest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
    /// Arbitrary per-tracker fields (loosely typed).
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Record {
    /// Build a record from extra field pairs; id/date/createdAt are filled in
    /// by the repository at insert time when left empty.
    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut record = Record::default();
        for (k, v) in fields {
            record.rest.insert(k.into(), v);
        }
        record
    }

    /// Numeric view of an extra field; missing or non-numeric values count 0.
    pub fn numeric_field(&self, name: &str) -> f64 {
        self.rest.get(name).map(coerce::number_or_zero).unwrap_or(0.0)
    }

    /// Coerce an extra field to a number in place, creating it as `0` when
    /// absent. Applied at the record-creation boundary for built-in kinds.
    pub(crate) fn coerce_numeric(&mut self, name: &str) {
        let n = self.numeric_field(name);
        self.rest.insert(name.to_string(), coerce_number_value(n));
    }

    /// Merge a patch into this record. The `id` is identity and never changes;
    /// `date` and `createdAt` are replaced when the patch carries strings, and
    /// everything else lands in the extra-field map.
    pub(crate) fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            match key.as_str() {
                "id" => {}
                "date" => {
                    if let Value::String(s) = value {
                        self.date = s.clone();
                    }
                }
                "createdAt" => {
                    if let Value::String(s) = value {
                        self.created_at = s.clone();
                    }
                }
                _ => {
                    self.rest.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Primary chronological key: the calendar day, falling back to the
    /// creation timestamp for records that never got a day.
    pub fn primary_day(&self) -> &str {
        if self.date.is_empty() {
            &self.created_at
        } else {
            &self.date
        }
    }

    /// Ordering key used by retention and sorted reads: `(date, createdAt)`
    /// ascending. ISO strings compare correctly lexicographically.
    pub(crate) fn sort_key(&self) -> (&str, &str) {
        (self.primary_day(), &self.created_at)
    }
}

/// Integral results are stored as JSON integers so `12` does not turn into
/// `12.0` on the next persisted write.
fn coerce_number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Number(0.into()))
    }
}
