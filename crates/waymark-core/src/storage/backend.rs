//! Key/value persistence backends
//!
//! The store persists each collection as a JSON document under a string key.
//! [`SqliteBackend`] is the durable default (single `kv` table, WAL mode);
//! [`MemoryBackend`] backs tests and session-only fallback.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Backend unavailable (poisoned lock, injected failure)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// Abstraction over the key/value medium holding persisted collections.
///
/// Values are opaque JSON strings; the versioned-envelope logic above this
/// trait owns their shape. Implementations must be safe to share across the
/// debounced persister's background tasks.
pub trait StorageBackend: Send + Sync {
    /// Read the payload stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Write `value` under `key`, replacing any previous payload.
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// SQLITE BACKEND
// ============================================================================

/// Durable backend: one `kv(key, value)` table in a SQLite database.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the backing database. With no explicit path the
    /// database lives in the platform data directory.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "waymark", "core").ok_or_else(|| {
                    StorageError::Init("Could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Personal data: owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = std::fs::set_permissions(
                        data_dir,
                        std::fs::Permissions::from_mode(0o700),
                    );
                }
                data_dir.join("waymark.db")
            }
        };

        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS kv (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;

        Ok(SqliteBackend {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("kv connection lock poisoned".to_string()))
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// MEMORY BACKEND
// ============================================================================

/// In-memory backend for tests and session-only operation.
///
/// `fail_writes` turns every `set` into an error so persistence-failure
/// handling can be exercised deterministically.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.map
            .lock()
            .map_err(|_| StorageError::Unavailable("memory map lock poisoned".to_string()))
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".to_string()));
        }
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sqlite_round_trip() {
        let dir = tempdir().unwrap();
        let backend = SqliteBackend::new(Some(dir.path().join("test.db"))).unwrap();
        assert_eq!(backend.get("missing").unwrap(), None);

        backend.set("tracker_data", "[1,2,3]").unwrap();
        assert_eq!(backend.get("tracker_data").unwrap().as_deref(), Some("[1,2,3]"));

        backend.set("tracker_data", "[]").unwrap();
        assert_eq!(backend.get("tracker_data").unwrap().as_deref(), Some("[]"));

        backend.remove("tracker_data").unwrap();
        assert_eq!(backend.get("tracker_data").unwrap(), None);
    }

    #[test]
    fn memory_failure_injection() {
        let backend = MemoryBackend::new();
        backend.set("k", "v").unwrap();

        backend.set_fail_writes(true);
        assert!(backend.set("k", "v2").is_err());
        backend.set_fail_writes(false);

        // the failed write left the old value intact
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v"));
    }
}
