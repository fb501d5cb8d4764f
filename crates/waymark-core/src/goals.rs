//! Goal Repository
//!
//! Goals are targets tied to trackers, persisted under `goal_data` in a
//! versioned envelope. Deleting a goal arms a single-slot undo that expires
//! after a short window; progress and percent are derived at read time from
//! tracker snapshots and never stored.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::model::{coerce, Goal, GoalProgress, GoalType, Timeframe, Tracker};
use crate::storage::{
    envelope_payload, parse_envelope, run_migrations, save_collection, Migration, Persister,
    StorageBackend, DEFAULT_DEBOUNCE,
};

/// Current goal schema version: v1 backfills `createdAt`.
pub const GOAL_SCHEMA_VERSION: u32 = 1;

pub const GOAL_DATA_KEY: &str = "goal_data";

/// How long a deleted goal can be restored.
pub const UNDO_WINDOW: Duration = Duration::from_secs(5);

pub const GOAL_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "backfill createdAt and the start/end date window on goals",
    up: migrate_normalize_goal_shape,
}];

/// Fill only absent keys: present values survive untouched, even odd ones,
/// which keeps the step idempotent. An absent `endDate` inherits the goal's
/// own `startDate` before the today-default kicks in.
fn migrate_normalize_goal_shape(items: &[Value]) -> Result<Vec<Value>, String> {
    let today = Value::String(coerce::day_string(coerce::today()));
    items
        .iter()
        .map(|item| {
            let mut map = item
                .as_object()
                .cloned()
                .ok_or_else(|| "goal item is not an object".to_string())?;
            map.entry("createdAt")
                .or_insert_with(|| Value::String(coerce::now_iso()));
            let fallback_end = map
                .get("startDate")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .unwrap_or_else(|| today.clone());
            map.entry("startDate").or_insert_with(|| today.clone());
            map.entry("endDate").or_insert(fallback_end);
            map.entry("timeframe")
                .or_insert_with(|| Value::String("daily".to_string()));
            Ok(Value::Object(map))
        })
        .collect()
}

/// Partial update for a goal definition.
#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub name: Option<String>,
    pub goal_type: Option<GoalType>,
    pub tracker_ids: Option<Vec<String>>,
    pub target: Option<f64>,
    pub unit: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

struct PendingDelete {
    goal: Goal,
    expires_at: Instant,
}

// ============================================================================
// GOAL STORE
// ============================================================================

/// Repository over goals with single-slot delete undo.
///
/// The undo slot holds at most one deleted goal. Deleting another goal while
/// one is pending drops the earlier one for good. Expiry is checked lazily
/// at [`undo_delete`](Self::undo_delete) time.
pub struct GoalStore {
    backend: Arc<dyn StorageBackend>,
    persister: Persister,
    goals: Vec<Goal>,
    pending: Option<PendingDelete>,
    undo_window: Duration,
    hydrated: bool,
    error: Option<String>,
}

impl GoalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let persister = Persister::new(Arc::clone(&backend), DEFAULT_DEBOUNCE);
        GoalStore {
            backend,
            persister,
            goals: Vec::new(),
            pending: None,
            undo_window: UNDO_WINDOW,
            hydrated: false,
            error: None,
        }
    }

    /// Load and migrate persisted goals. Unreadable storage keeps the current
    /// state and records a collection-level error.
    pub fn hydrate(&mut self) {
        self.error = None;
        let raw = match self.backend.get(GOAL_DATA_KEY) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Failed to hydrate goals: {}", err);
                self.error = Some("Could not load goals".to_string());
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
                GOAL_SCHEMA_VERSION,
                GOAL_MIGRATIONS,
            );
            self.goals = crate::storage::decode_items(items, "goal");
            if version != stored_version {
                if let Err(err) =
                    save_collection(self.backend.as_ref(), GOAL_DATA_KEY, &self.goals, version)
                {
                    tracing::warn!("Failed to persist migrated goals: {}", err);
                }
            }
        }
        self.hydrated = true;
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Add a goal. Assigns an id when empty and always stamps `createdAt`
    /// with the current instant, replacing whatever the caller passed.
    pub fn add_goal(&mut self, mut goal: Goal) {
        if goal.id.is_empty() {
            goal.id = Uuid::new_v4().to_string();
        }
        goal.created_at = coerce::now_iso();
        self.goals.push(goal);
        self.persist();
    }

    /// Merge a patch into a goal; silent no-op when the id is unknown.
    pub fn update_goal(&mut self, goal_id: &str, patch: GoalPatch) {
        let Some(goal) = self.goals.iter_mut().find(|g| g.id == goal_id) else {
            tracing::debug!("update_goal: unknown goal {}", goal_id);
            return;
        };
        if let Some(name) = patch.name {
            goal.name = name;
        }
        if let Some(goal_type) = patch.goal_type {
            goal.goal_type = goal_type;
        }
        if let Some(tracker_ids) = patch.tracker_ids {
            goal.tracker_ids = tracker_ids;
        }
        if let Some(target) = patch.target {
            goal.target = target;
        }
        if let Some(unit) = patch.unit {
            goal.unit = unit;
        }
        if let Some(timeframe) = patch.timeframe {
            goal.timeframe = timeframe;
        }
        if let Some(start_date) = patch.start_date {
            goal.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            goal.end_date = end_date;
        }
        self.persist();
    }

    /// Remove a goal and arm the undo slot. A goal already pending undo is
    /// dropped for good.
    pub fn delete_goal(&mut self, goal_id: &str) {
        let Some(pos) = self.goals.iter().position(|g| g.id == goal_id) else {
            tracing::debug!("delete_goal: unknown goal {}", goal_id);
            return;
        };
        let goal = self.goals.remove(pos);
        self.pending = Some(PendingDelete {
            goal,
            expires_at: Instant::now() + self.undo_window,
        });
        self.persist();
    }

    /// Restore the pending deleted goal. Returns `false` when nothing is
    /// pending or the window has lapsed; either way the slot is cleared.
    pub fn undo_delete(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if Instant::now() >= pending.expires_at {
            return false;
        }
        self.goals.push(pending.goal);
        self.persist();
        true
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == goal_id)
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_pending_undo(&self) -> bool {
        self.pending.is_some()
    }

    /// Every goal bundled with progress derived from tracker snapshots.
    pub fn with_progress(&self, trackers: &[Tracker], today: NaiveDate) -> Vec<GoalProgress> {
        self.goals
            .iter()
            .map(|goal| goal_progress(goal, trackers, today))
            .collect()
    }

    /// Force any pending debounced write to land now (shutdown/tests).
    pub fn flush(&self) {
        self.persister.flush();
    }

    #[cfg(test)]
    pub(crate) fn set_undo_window(&mut self, window: Duration) {
        self.undo_window = window;
    }

    fn persist(&self) {
        if !self.hydrated {
            return;
        }
        match envelope_payload(&self.goals, GOAL_SCHEMA_VERSION) {
            Ok(payload) => self.persister.schedule(GOAL_DATA_KEY, payload),
            Err(err) => tracing::warn!("Failed to encode goals: {}", err),
        }
    }
}

// ============================================================================
// PROGRESS ENGINE
// ============================================================================

/// Derive one goal's progress from tracker snapshots.
///
/// Daily goals sum today's record values for each linked tracker using the
/// tracker's value-field rule; total goals sum the trackers' cached aggregate
/// values. Dangling tracker ids contribute zero. Percent is clamped to 100
/// and reads zero for non-positive targets.
pub fn goal_progress(goal: &Goal, trackers: &[Tracker], today: NaiveDate) -> GoalProgress {
    let day = coerce::day_string(today);
    let progress: f64 = goal
        .tracker_ids
        .iter()
        .filter_map(|id| trackers.iter().find(|t| t.id == *id))
        .map(|tracker| match goal.goal_type {
            GoalType::Total => tracker.value,
            GoalType::Daily => tracker
                .records
                .iter()
                .filter(|r| r.date == day)
                .map(|r| crate::tracker::record_value(tracker, r))
                .sum(),
        })
        .sum();

    let percent = if goal.target > 0.0 {
        ((progress / goal.target) * 100.0).min(100.0)
    } else {
        0.0
    };

    GoalProgress {
        goal: goal.clone(),
        progress,
        percent,
    }
}
