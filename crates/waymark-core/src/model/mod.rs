//! Model module - core data types
//!
//! Trackers with declared fields and append-only record logs, goals and
//! streak goals with derived progress, retention policy, and the single home
//! of loose-input coercion.

pub mod coerce;
mod goal;
mod record;
mod tracker;

pub use goal::{Goal, GoalProgress, GoalType, StreakGoal, StreakGoalStats, Timeframe};
pub use record::Record;
pub use tracker::{
    default_trackers, Field, RetentionConfig, RetentionStrategy, Tracker, TrackerKind,
};

pub(crate) use tracker::BUILTIN_FILTER_FIELDS;
