//! Test Store Manager
//!
//! Provides isolated store instances for testing:
//! - A SQLite backend in a temporary directory, cleaned up on drop
//! - All three repositories wired to the same backend
//! - Payload seeding before hydration, for migration tests

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use waymark_core::{GoalStore, SqliteBackend, StorageBackend, StreakGoalStore, TrackerStore};

/// Manager for test stores.
///
/// Creates an isolated SQLite database per test so runs never interfere.
/// The database is deleted when the manager is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let mut stores = TestStoreManager::new_temp();
/// stores.hydrate_all();
/// stores.trackers.add_record("reading", record);
/// ```
pub struct TestStoreManager {
    pub backend: Arc<dyn StorageBackend>,
    pub trackers: TrackerStore,
    pub goals: GoalStore,
    pub streaks: StreakGoalStore,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestStoreManager {
    /// Create stores over a fresh SQLite database in a temporary directory.
    /// Stores are NOT hydrated, so tests can seed raw payloads first.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_waymark.db");
        let backend: Arc<dyn StorageBackend> = Arc::new(
            SqliteBackend::new(Some(db_path.clone())).expect("Failed to open test database"),
        );
        Self {
            trackers: TrackerStore::new(Arc::clone(&backend)),
            goals: GoalStore::new(Arc::clone(&backend)),
            streaks: StreakGoalStore::new(Arc::clone(&backend)),
            backend,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    /// Write a raw payload under a storage key, bypassing the stores.
    pub fn seed(&self, key: &str, payload: &str) {
        self.backend.set(key, payload).expect("Failed to seed payload");
    }

    /// Hydrate all three stores.
    pub fn hydrate_all(&mut self) {
        self.trackers.hydrate();
        self.goals.hydrate();
        self.streaks.hydrate();
    }

    /// Flush debounced writes and reopen every store from disk, as a fresh
    /// app launch would.
    pub fn relaunch(&mut self) {
        self.trackers.flush();
        self.goals.flush();
        self.streaks.flush();
        self.trackers = TrackerStore::new(Arc::clone(&self.backend));
        self.goals = GoalStore::new(Arc::clone(&self.backend));
        self.streaks = StreakGoalStore::new(Arc::clone(&self.backend));
        self.hydrate_all();
    }

    /// Raw payload stored under a key, if any.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.backend.get(key).expect("Failed to read payload")
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }
}
