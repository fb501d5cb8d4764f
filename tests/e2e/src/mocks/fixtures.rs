//! Fixture builders and legacy payloads shared across journey tests.

use serde_json::json;
use waymark_core::Record;

/// A dated record with one numeric field.
pub fn dated_record(id: &str, date: &str, field: &str, value: f64) -> Record {
    let mut record = Record::with_fields([(field, json!(value))]);
    record.id = id.to_string();
    record.date = date.to_string();
    record
}

/// A pre-versioning `tracker_data` payload: bare array, no `valueFieldId`,
/// no `createdAt`, legacy field shapes.
pub fn legacy_tracker_payload() -> String {
    json!([
        {
            "id": "reading",
            "title": "Reading",
            "unit": "pages",
            "value": "37",
            "fields": [{"id": "pages", "label": null}],
            "records": [
                {"id": "r1", "date": "2024-01-01", "pages": "12"},
                {"id": "r2", "date": "2024-01-02", "pages": 25}
            ]
        },
        {
            "id": "custom-1",
            "title": "Water",
            "fields": [{"id": "glasses", "unit": "glasses"}],
            "records": []
        }
    ])
    .to_string()
}

/// A pre-versioning `goal_data` payload without `createdAt`.
pub fn legacy_goal_payload() -> String {
    json!([
        {
            "id": "g1",
            "type": "daily",
            "name": "Read every day",
            "trackerIds": ["reading"],
            "target": "30",
            "timeframe": "weekly"
        }
    ])
    .to_string()
}
