//! Storage Module
//!
//! Key/value persistence with:
//! - Versioned JSON envelopes (`{"__v": n, "data": [..]}`) with legacy
//!   bare-array compatibility
//! - Ordered, idempotent schema migration tables
//! - Debounced write coalescing (last-write-wins per key)
//! - SQLite and in-memory backends

mod backend;
mod debounce;
mod versioned;

pub use backend::{MemoryBackend, Result, SqliteBackend, StorageBackend, StorageError};
pub use debounce::{Persister, DEFAULT_DEBOUNCE};
pub use versioned::{
    decode_items, envelope_payload, load_collection, parse_envelope, run_migrations,
    save_collection, LoadedCollection, Migration, MigrationFn,
};
