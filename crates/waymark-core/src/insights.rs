//! Insights Engine
//!
//! Pure derivations over tracker, goal, and streak snapshots: a today
//! summary, 7-day trend comparisons, monthly expense category breakdown,
//! daily-goal pace against elapsed time, a streak summary, and recent
//! activity. Nothing here is persisted; every call recomputes from the
//! snapshots and an explicit `today`.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::model::{coerce, GoalProgress, GoalType, Record, StreakGoalStats, Tracker};
use crate::tracker::record_value;

/// Built-in trackers lead the today summary, in this order.
const TODAY_PRIORITY: &[&str] = &["reading", "workout", "meditation", "expense"];

/// Custom trackers shown in the today summary.
const TODAY_CUSTOM_LIMIT: usize = 2;

/// Expense categories broken out individually; the rest fold into `Other`.
const CATEGORY_LIMIT: usize = 3;

/// Streak goals shown in the streak summary.
const STREAK_LIMIT: usize = 3;

/// Records shown in the recent-activity feed.
const ACTIVITY_LIMIT: usize = 15;

// ============================================================================
// SNAPSHOT TYPES
// ============================================================================

/// One tracker's line in the today summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayEntry {
    pub tracker_id: String,
    pub title: String,
    /// Sum of today's record values under the tracker's value-field rule.
    pub value: f64,
    pub unit: String,
}

/// Week-over-week comparison for one tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendEntry {
    pub tracker_id: String,
    pub title: String,
    /// Total over the last seven days, today inclusive.
    pub current: f64,
    /// Total over the seven days before that.
    pub previous: f64,
    /// Percent change; against a zero previous week the current total reads
    /// directly as the percentage.
    pub change_percent: f64,
}

/// One slice of the monthly expense breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySlice {
    pub name: String,
    pub total: f64,
    /// Share of the displayed slices, not of all spending.
    pub percent: f64,
}

/// How a daily goal is pacing against elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPaceEntry {
    pub goal_id: String,
    pub name: String,
    pub target: f64,
    pub progress: f64,
    pub unit: String,
    pub days_total: u32,
    /// Days elapsed including today, capped at the window length; negative
    /// before the goal starts.
    pub days_elapsed: i64,
    pub required_per_day: f64,
    /// Progress a perfectly even pace would have reached by now.
    pub expected_by_now: f64,
    /// Actual progress minus expected; positive means ahead of pace.
    pub delta: f64,
}

/// One record in the recent-activity feed, tagged with its tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub tracker_id: String,
    pub title: String,
    pub unit: String,
    /// The record's value under the tracker's value-field rule.
    pub value: f64,
    #[serde(flatten)]
    pub record: Record,
}

/// The full derived insights view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSnapshot {
    pub today: Vec<TodayEntry>,
    pub trends: Vec<TrendEntry>,
    pub expense_categories: Vec<CategorySlice>,
    pub goal_pace: Vec<GoalPaceEntry>,
    pub streak_summary: Vec<StreakGoalStats>,
    pub recent_activity: Vec<ActivityEntry>,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Derive the full insights view from snapshots.
pub fn snapshot(
    trackers: &[Tracker],
    goals: &[GoalProgress],
    streaks: &[StreakGoalStats],
    today: NaiveDate,
) -> InsightsSnapshot {
    InsightsSnapshot {
        today: today_summary(trackers, today),
        trends: trends(trackers, today),
        expense_categories: expense_categories(trackers, today),
        goal_pace: goal_pace(goals, today),
        streak_summary: streak_summary(streaks),
        recent_activity: recent_activity(trackers),
    }
}

fn value_on_day(tracker: &Tracker, day: &str) -> f64 {
    tracker
        .records
        .iter()
        .filter(|r| r.date == day)
        .map(|r| record_value(tracker, r))
        .sum()
}

/// Built-in trackers in priority order, then the first custom trackers.
pub fn today_summary(trackers: &[Tracker], today: NaiveDate) -> Vec<TodayEntry> {
    let day = coerce::day_string(today);
    let mut out = Vec::new();
    for id in TODAY_PRIORITY {
        if let Some(tracker) = trackers.iter().find(|t| t.id == *id) {
            out.push(entry_for(tracker, &day));
        }
    }
    let customs = trackers
        .iter()
        .filter(|t| !TODAY_PRIORITY.contains(&t.id.as_str()))
        .take(TODAY_CUSTOM_LIMIT);
    for tracker in customs {
        out.push(entry_for(tracker, &day));
    }
    out
}

fn entry_for(tracker: &Tracker, day: &str) -> TodayEntry {
    TodayEntry {
        tracker_id: tracker.id.clone(),
        title: tracker.title.clone(),
        value: value_on_day(tracker, day),
        unit: tracker.unit.clone(),
    }
}

/// Week-over-week totals for every tracker, quiet ones included.
pub fn trends(trackers: &[Tracker], today: NaiveDate) -> Vec<TrendEntry> {
    let current_start = today.checked_sub_days(Days::new(6));
    let previous_start = today.checked_sub_days(Days::new(13));
    let (Some(current_start), Some(previous_start)) = (current_start, previous_start) else {
        return Vec::new();
    };

    trackers
        .iter()
        .map(|tracker| {
            let mut current = 0.0;
            let mut previous = 0.0;
            for record in &tracker.records {
                let Some(day) = coerce::parse_day(&record.date) else {
                    continue;
                };
                if day >= current_start && day <= today {
                    current += record_value(tracker, record);
                } else if day >= previous_start && day < current_start {
                    previous += record_value(tracker, record);
                }
            }
            let denominator = if previous == 0.0 { 1.0 } else { previous };
            let change_percent = ((current - previous) / denominator) * 100.0;
            TrendEntry {
                tracker_id: tracker.id.clone(),
                title: tracker.title.clone(),
                current,
                previous,
                change_percent,
            }
        })
        .collect()
}

/// Current-month expense totals grouped by each record's `category` field:
/// the top categories individually, everything else folded into `Other`.
/// Percentages are shares of the displayed slices.
pub fn expense_categories(trackers: &[Tracker], today: NaiveDate) -> Vec<CategorySlice> {
    let Some(expense) = trackers.iter().find(|t| t.id == "expense") else {
        return Vec::new();
    };

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for record in &expense.records {
        let Some(day) = coerce::parse_day(&record.date) else {
            continue;
        };
        if day.year() != today.year() || day.month() != today.month() {
            continue;
        }
        let name = match record.rest.get("category").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "Uncategorized".to_string(),
        };
        *totals.entry(name).or_insert(0.0) += record.numeric_field("amount");
    }

    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut shown: Vec<(String, f64)> = ranked.iter().take(CATEGORY_LIMIT).cloned().collect();
    let rest: f64 = ranked.iter().skip(CATEGORY_LIMIT).map(|(_, t)| t).sum();
    if rest > 0.0 {
        shown.push(("Other".to_string(), rest));
    }

    let shown_total: f64 = shown.iter().map(|(_, t)| t).sum();
    let denominator = if shown_total == 0.0 { 1.0 } else { shown_total };
    shown
        .into_iter()
        .map(|(name, total)| CategorySlice {
            name,
            total,
            percent: (total / denominator) * 100.0,
        })
        .collect()
}

/// Pace entries for daily goals. Missing dates default to today, the window
/// is never shorter than one day, and goals that have not started yet carry
/// a negative elapsed-day count.
pub fn goal_pace(goals: &[GoalProgress], today: NaiveDate) -> Vec<GoalPaceEntry> {
    goals
        .iter()
        .filter(|gp| gp.goal.goal_type == GoalType::Daily)
        .map(|gp| {
            let goal = &gp.goal;
            let start = coerce::parse_day(&goal.start_date).unwrap_or(today);
            let end = coerce::parse_day(&goal.end_date).unwrap_or(today);
            let days_total = ((end - start).num_days() + 1).max(1) as u32;
            let days_elapsed = ((today - start).num_days() + 1).min(days_total as i64);
            let required_per_day = if goal.target != 0.0 {
                goal.target / days_total as f64
            } else {
                0.0
            };
            let expected_by_now = required_per_day * days_elapsed as f64;
            GoalPaceEntry {
                goal_id: goal.id.clone(),
                name: goal.name.clone(),
                target: goal.target,
                progress: gp.progress,
                unit: goal.unit.clone(),
                days_total,
                days_elapsed,
                required_per_day,
                expected_by_now,
                delta: gp.progress - expected_by_now,
            }
        })
        .collect()
}

/// The streak goals with the longest current runs.
pub fn streak_summary(streaks: &[StreakGoalStats]) -> Vec<StreakGoalStats> {
    let mut leaders = streaks.to_vec();
    leaders.sort_by(|a, b| b.current_streak.cmp(&a.current_streak));
    leaders.truncate(STREAK_LIMIT);
    leaders
}

/// The most recent records across all trackers, newest first by creation
/// timestamp (falling back to the record's day).
pub fn recent_activity(trackers: &[Tracker]) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = trackers
        .iter()
        .flat_map(|tracker| {
            tracker.records.iter().map(|record| ActivityEntry {
                tracker_id: tracker.id.clone(),
                title: tracker.title.clone(),
                unit: tracker.unit.clone(),
                value: record_value(tracker, record),
                record: record.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| activity_key(&b.record).cmp(activity_key(&a.record)));
    entries.truncate(ACTIVITY_LIMIT);
    entries
}

fn activity_key(record: &Record) -> &str {
    if record.created_at.is_empty() {
        &record.date
    } else {
        &record.created_at
    }
}
