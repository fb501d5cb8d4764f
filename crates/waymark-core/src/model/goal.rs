//! Goal and streak-goal definitions
//!
//! Goals are targets tied to one or more trackers, evaluated either per-day
//! or as a running total. Streak goals measure consecutive calendar days with
//! at least one record. Progress, percent, and streak statistics are derived
//! at read time and never stored.

use serde::{Deserialize, Serialize};

// ============================================================================
// GOALS
// ============================================================================

/// How a goal's progress is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    /// Resets each day: sums only today's records.
    #[default]
    Daily,
    /// Running total: sums each tracker's cached aggregate value.
    Total,
}

impl GoalType {
    pub fn parse_name(s: &str) -> Self {
        match s {
            "total" => GoalType::Total,
            _ => GoalType::Daily,
        }
    }
}

impl<'de> Deserialize<'de> for GoalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(GoalType::parse_name(&s))
    }
}

/// Display timeframe attached to a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Timeframe {
    pub fn parse_name(s: &str) -> Self {
        match s {
            "weekly" => Timeframe::Weekly,
            "monthly" => Timeframe::Monthly,
            "yearly" => Timeframe::Yearly,
            _ => Timeframe::Daily,
        }
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Timeframe::parse_name(&s))
    }
}

/// A target tied to one or more trackers.
///
/// `start_date`/`end_date` are calendar days (`YYYY-MM-DD`); dangling
/// `tracker_ids` are tolerated by the engine and contribute zero progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub goal_type: GoalType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracker_ids: Vec<String>,
    #[serde(default, deserialize_with = "super::coerce::lenient_f64")]
    pub target: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

/// A goal bundled with its derived progress - never stored, always computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: f64,
    pub percent: f64,
}

// ============================================================================
// STREAK GOALS
// ============================================================================

/// A goal measured by consecutive calendar days with at least one record in
/// a single tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakGoal {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracker_id: String,
    #[serde(
        default = "default_target_days",
        deserialize_with = "super::coerce::lenient_days"
    )]
    pub target_days: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,
}

fn default_target_days() -> u32 {
    1
}

/// A streak goal with derived streak statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakGoalStats {
    #[serde(flatten)]
    pub goal: StreakGoal,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub percent: f64,
}
