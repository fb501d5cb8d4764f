//! Versioned collection envelopes and schema migration
//!
//! Each persisted collection is an envelope `{"__v": <version>, "data": [..]}`.
//! A bare JSON array is the pre-versioning legacy form and reads as schema
//! version 0. Migration tables are ordered lists of pure, idempotent
//! transforms applied one version step at a time; a failing step halts the
//! run and the collection proceeds with best-effort data.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::backend::{Result, StorageBackend};

/// Envelope key carrying the schema version.
const VERSION_KEY: &str = "__v";

// ============================================================================
// MIGRATIONS
// ============================================================================

/// A pure transform over the raw item list. Returns the upgraded list, or an
/// error message when the step cannot be applied. Every migration MUST be
/// idempotent for already-upgraded data so partial-migration retries are safe.
pub type MigrationFn = fn(&[Value]) -> std::result::Result<Vec<Value>, String>;

/// One schema upgrade step.
#[derive(Clone)]
pub struct Migration {
    /// The schema version this step upgrades TO (applies when the stored
    /// version is `version - 1`).
    pub version: u32,
    /// Description, logged when the step runs.
    pub description: &'static str,
    /// The transform itself.
    pub up: MigrationFn,
}

/// Apply migration steps from `from` up to `to`.
///
/// Versions with no table entry are skipped (holes are legal). A failing step
/// halts the run at its version and the partially migrated data is returned;
/// the error is logged, never raised.
pub fn run_migrations(
    mut items: Vec<Value>,
    from: u32,
    to: u32,
    table: &[Migration],
) -> (Vec<Value>, u32) {
    let mut version = from;
    while version < to {
        if let Some(step) = table.iter().find(|m| m.version == version + 1) {
            match (step.up)(&items) {
                Ok(next) => {
                    tracing::info!(
                        "Applied migration v{}: {}",
                        step.version,
                        step.description
                    );
                    items = next;
                }
                Err(err) => {
                    tracing::warn!(
                        "Migration to v{} failed, keeping v{} data: {}",
                        step.version,
                        version,
                        err
                    );
                    return (items, version);
                }
            }
        }
        version += 1;
    }
    (items, version)
}

// ============================================================================
// ENVELOPE PARSING
// ============================================================================

/// A collection as read from storage, before typed decoding.
#[derive(Debug, Clone, Default)]
pub struct LoadedCollection {
    pub items: Vec<Value>,
    pub version: u32,
}

/// Parse a stored payload into items + version.
///
/// Bare arrays are legacy version 0; envelopes carry `__v`. Anything
/// unparsable reads as an empty version-0 collection - corrupt payloads
/// degrade to a fresh collection instead of failing hydration.
pub fn parse_envelope(raw: &str) -> LoadedCollection {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => LoadedCollection { items, version: 0 },
        Ok(Value::Object(map)) => {
            let version = map
                .get(VERSION_KEY)
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            match map.get("data") {
                Some(Value::Array(items)) => LoadedCollection {
                    items: items.clone(),
                    version,
                },
                _ => LoadedCollection::default(),
            }
        }
        _ => LoadedCollection::default(),
    }
}

/// Load a collection. `Ok(None)` means the key has never been written (fresh
/// install); backend read errors propagate so callers can surface a
/// collection-level error flag.
pub fn load_collection(
    backend: &dyn StorageBackend,
    key: &str,
) -> Result<Option<LoadedCollection>> {
    Ok(backend.get(key)?.map(|raw| parse_envelope(&raw)))
}

/// Serialize items into the envelope payload written to storage. Saves always
/// use the envelope form, never the legacy bare array.
pub fn envelope_payload<T: Serialize>(items: &[T], version: u32) -> Result<String> {
    let data = serde_json::to_value(items)?;
    Ok(json!({ VERSION_KEY: version, "data": data }).to_string())
}

/// Write a collection envelope directly (used after migration upgrades, where
/// the upgraded form should land immediately rather than debounced).
pub fn save_collection<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    items: &[T],
    version: u32,
) -> Result<()> {
    backend.set(key, &envelope_payload(items, version)?)
}

/// Decode migrated items into their typed form, dropping (and logging)
/// anything that still fails to deserialize.
pub fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(decoded) => out.push(decoded),
            Err(err) => tracing::warn!("Dropping undecodable {} item: {}", what, err),
        }
    }
    out
}
