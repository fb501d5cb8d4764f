//! Streak-Goal Repository
//!
//! Streak goals measure consecutive calendar days with at least one record
//! in a single tracker. Definitions persist under `streak_goal_data`; the
//! current streak, longest streak, and percent are derived at read time from
//! tracker snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use serde_json::Value;

use crate::model::{coerce, StreakGoal, StreakGoalStats, Tracker};
use crate::storage::{
    envelope_payload, parse_envelope, run_migrations, save_collection, Migration, Persister,
    StorageBackend, DEFAULT_DEBOUNCE,
};

/// Current streak-goal schema version: v1 backfills `createdAt` and a
/// minimum `targetDays`.
pub const STREAK_GOAL_SCHEMA_VERSION: u32 = 1;

pub const STREAK_GOAL_DATA_KEY: &str = "streak_goal_data";

pub const STREAK_GOAL_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "backfill createdAt and targetDays on streak goals",
    up: migrate_backfill_streak_goal,
}];

fn migrate_backfill_streak_goal(items: &[Value]) -> Result<Vec<Value>, String> {
    items
        .iter()
        .map(|item| {
            let mut map = item
                .as_object()
                .cloned()
                .ok_or_else(|| "streak goal item is not an object".to_string())?;
            map.entry("createdAt")
                .or_insert_with(|| Value::String(coerce::now_iso()));
            map.entry("targetDays").or_insert_with(|| Value::from(1));
            Ok(Value::Object(map))
        })
        .collect()
}

/// Walk-back cap when counting a streak; protects against degenerate data.
const MAX_STREAK_DAYS: u32 = 400;

// ============================================================================
// STREAK STORE
// ============================================================================

/// Repository over streak goals.
pub struct StreakGoalStore {
    backend: Arc<dyn StorageBackend>,
    persister: Persister,
    goals: Vec<StreakGoal>,
    hydrated: bool,
    error: Option<String>,
}

impl StreakGoalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let persister = Persister::new(Arc::clone(&backend), DEFAULT_DEBOUNCE);
        StreakGoalStore {
            backend,
            persister,
            goals: Vec::new(),
            hydrated: false,
            error: None,
        }
    }

    /// Load persisted streak goals; unreadable storage records an error and
    /// keeps the current state.
    pub fn hydrate(&mut self) {
        self.error = None;
        let raw = match self.backend.get(STREAK_GOAL_DATA_KEY) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Failed to hydrate streak goals: {}", err);
                self.error = Some("Could not load streak goals".to_string());
                self.hydrated = true;
                return;
            }
        };
        if let Some(raw) = raw {
            let loaded = parse_envelope(&raw);
            let stored_version = loaded.version;
            let (items, version) = run_migrations(
                loaded.items,
                stored_version,
                STREAK_GOAL_SCHEMA_VERSION,
                STREAK_GOAL_MIGRATIONS,
            );
            self.goals = crate::storage::decode_items(items, "streak goal");
            if version != stored_version {
                if let Err(err) = save_collection(
                    self.backend.as_ref(),
                    STREAK_GOAL_DATA_KEY,
                    &self.goals,
                    version,
                ) {
                    tracing::warn!("Failed to persist migrated streak goals: {}", err);
                }
            }
        }
        self.hydrated = true;
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Add a streak goal. Rejects (as a logged no-op) empty names, tracker
    /// ids, or a zero target; trims the name. `createdAt` is never stamped
    /// on newly created streak goals, only backfilled by migration.
    pub fn add_goal(&mut self, goal: StreakGoal) {
        let name = goal.name.trim().to_string();
        if name.is_empty() || goal.tracker_id.is_empty() || goal.target_days == 0 {
            tracing::debug!("add_goal: rejected incomplete streak goal");
            return;
        }
        let id = if goal.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            goal.id
        };
        self.goals.push(StreakGoal {
            id,
            name,
            tracker_id: goal.tracker_id,
            target_days: goal.target_days,
            created_at: String::new(),
        });
        self.persist();
    }

    /// Remove a streak goal; silent no-op when the id is unknown. There is
    /// no undo for streak goals.
    pub fn delete_goal(&mut self, goal_id: &str) {
        let before = self.goals.len();
        self.goals.retain(|g| g.id != goal_id);
        if self.goals.len() == before {
            tracing::debug!("delete_goal: unknown streak goal {}", goal_id);
            return;
        }
        self.persist();
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn goals(&self) -> &[StreakGoal] {
        &self.goals
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every streak goal bundled with derived streak statistics.
    pub fn with_stats(&self, trackers: &[Tracker], today: NaiveDate) -> Vec<StreakGoalStats> {
        self.goals
            .iter()
            .map(|goal| {
                let days = trackers
                    .iter()
                    .find(|t| t.id == goal.tracker_id)
                    .map(record_date_set)
                    .unwrap_or_default();
                let current = current_streak(&days, today);
                let longest = longest_streak(&days);
                let percent = if goal.target_days > 0 {
                    ((current as f64 / goal.target_days as f64) * 100.0).min(100.0)
                } else {
                    0.0
                };
                StreakGoalStats {
                    goal: goal.clone(),
                    current_streak: current,
                    longest_streak: longest,
                    percent,
                }
            })
            .collect()
    }

    /// Force any pending debounced write to land now (shutdown/tests).
    pub fn flush(&self) {
        self.persister.flush();
    }

    fn persist(&self) {
        if !self.hydrated {
            return;
        }
        match envelope_payload(&self.goals, STREAK_GOAL_SCHEMA_VERSION) {
            Ok(payload) => self.persister.schedule(STREAK_GOAL_DATA_KEY, payload),
            Err(err) => tracing::warn!("Failed to encode streak goals: {}", err),
        }
    }
}

// ============================================================================
// STREAK ENGINE
// ============================================================================

/// Distinct calendar days on which a tracker has at least one record.
/// Multiple records on one day count once; undated junk is ignored.
pub fn record_date_set(tracker: &Tracker) -> HashSet<NaiveDate> {
    tracker
        .records
        .iter()
        .filter_map(|r| coerce::parse_day(r.primary_day()))
        .collect()
}

/// Consecutive days ending at `today`, walking backward while each day is
/// present; the first missing day (today included) ends the count.
pub fn current_streak(days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = today;
    while days.contains(&cursor) && streak < MAX_STREAK_DAYS {
        streak += 1;
        match cursor.checked_sub_days(Days::new(1)) {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

/// Longest run of consecutive days anywhere in the set.
pub fn longest_streak(days: &HashSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    for &day in days {
        // only count from the start of each run
        let starts_run = day
            .checked_sub_days(Days::new(1))
            .is_none_or(|prev| !days.contains(&prev));
        if !starts_run {
            continue;
        }
        let mut cursor = day;
        let mut length = 0;
        while days.contains(&cursor) && length < MAX_STREAK_DAYS {
            length += 1;
            match cursor.checked_add_days(Days::new(1)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        longest = longest.max(length);
    }
    longest
}
