//! # Waymark Core
//!
//! Local-first personal tracking engine. Owns the persisted data model and
//! every derived view the app renders:
//!
//! - **Versioned Storage**: JSON envelopes with ordered, idempotent schema
//!   migrations and legacy bare-array compatibility
//! - **Trackers**: user-defined activity logs with per-kind numeric coercion
//!   and a cached aggregate value kept current on every mutation
//! - **Retention**: per-tracker log caps with prune or archive strategies
//! - **Goals**: daily and running-total targets with derived progress and a
//!   short-window delete undo
//! - **Streaks**: consecutive-day runs derived from record dates
//! - **Insights**: today summary, week-over-week trends, expense categories,
//!   goal pace, and a recent-activity feed
//!
//! All derived views take an explicit `today`, so every computation is
//! reproducible and testable against fixed dates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waymark_core::{MemoryBackend, Record, TrackerStore};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let mut trackers = TrackerStore::new(backend);
//! trackers.hydrate();
//!
//! trackers.add_record("reading", Record::with_fields([
//!     ("pages", serde_json::json!(25)),
//! ]));
//! assert_eq!(trackers.tracker("reading").unwrap().value, 25.0);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod goals;
pub mod insights;
pub mod model;
pub mod storage;
pub mod streaks;
pub mod tracker;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Data model
pub use model::{
    default_trackers, Field, Goal, GoalProgress, GoalType, Record, RetentionConfig,
    RetentionStrategy, StreakGoal, StreakGoalStats, Timeframe, Tracker, TrackerKind,
};

// Storage layer
pub use storage::{
    MemoryBackend, Migration, Persister, Result, SqliteBackend, StorageBackend, StorageError,
};

// Tracker repository
pub use tracker::{
    aggregate_value, record_value, ReadingStats, RecordIndex, RetentionPatch, TrackerPatch,
    TrackerStore, TRACKER_SCHEMA_VERSION,
};

// Goal repository
pub use goals::{goal_progress, GoalPatch, GoalStore, GOAL_SCHEMA_VERSION, UNDO_WINDOW};

// Streak repository
pub use streaks::{
    current_streak, longest_streak, record_date_set, StreakGoalStore, STREAK_GOAL_SCHEMA_VERSION,
};

// Insights engine
pub use insights::{
    snapshot, streak_summary, ActivityEntry, CategorySlice, GoalPaceEntry, InsightsSnapshot,
    TodayEntry, TrendEntry,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Goal, GoalProgress, GoalStore, GoalType, InsightsSnapshot, MemoryBackend, Record, Result,
        RetentionConfig, RetentionStrategy, SqliteBackend, StorageBackend, StorageError,
        StreakGoal, StreakGoalStats, StreakGoalStore, Tracker, TrackerStore,
    };
}
