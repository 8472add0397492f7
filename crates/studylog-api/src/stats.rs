//! Derived statistics returned by the aggregator and the goal calculator.
//!
//! These are plain value objects: recomputed on every call, never persisted.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use studylog_util::{GoalId, SubjectId};

use crate::GoalType;

/// Dashboard statistics for one user at one reference instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub today_minutes: u64,
    pub week_minutes: u64,
    pub month_minutes: u64,
    pub total_minutes: u64,
    /// `total_minutes / 60`, rounded half up
    pub total_hours: u64,
    pub today_sessions: u32,
    pub streak: u32,
    pub subject_ranking: Vec<SubjectRank>,
    /// Trailing 7 days, oldest first
    pub daily: Vec<DailyTotal>,
    /// Trailing 8 ISO weeks, oldest first
    pub weekly: Vec<WeeklyTotal>,
    /// Every day with at least one session, ascending
    pub calendar: Vec<CalendarDay>,
    pub most_productive_weekday: Option<Weekday>,
    pub average_minutes_per_day: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRank {
    /// 1-based position in the sorted ranking
    pub rank: u32,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_color: String,
    pub total_minutes: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub minutes: u64,
    pub sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTotal {
    /// Monday of the week
    pub week_start: NaiveDate,
    pub minutes: u64,
}

/// One heatmap cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub minutes: u64,
    pub sessions: u32,
    /// Intensity 0..=4 relative to the busiest day
    pub level: u8,
}

/// Progress of one active goal within its current period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_id: GoalId,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub subject_id: Option<SubjectId>,
    pub target_minutes: u32,
    pub achieved_minutes: u64,
    /// Capped at 100
    pub percentage: u32,
    /// Uses the uncapped achieved value
    pub is_completed: bool,
    pub subject_name: Option<String>,
    pub subject_color: Option<String>,
}

/// Badges earned from the current goal progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievements {
    /// Some goal is completed
    pub first_goal: bool,
    /// There is at least one daily goal and all of them are completed
    pub perfect_day: bool,
}

/// Integer percentage of `part` over `whole`, rounded half up.
///
/// Returns 0 when `whole` is 0.
pub fn percent_of(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (u128::from(part) * 200 + u128::from(whole)) / (u128::from(whole) * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// `numerator / denominator` rounded half up, 0 when `denominator` is 0
pub fn rounded_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let rounded = (u128::from(numerator) * 2 + u128::from(denominator)) / (u128::from(denominator) * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent_of(75, 135), 56);
        assert_eq!(percent_of(60, 135), 44);
        assert_eq!(percent_of(1, 8), 13);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(5, 0), 0);
        assert_eq!(percent_of(150, 100), 150);
    }

    #[test]
    fn rounded_div_guards_zero() {
        assert_eq!(rounded_div(135, 2), 68);
        assert_eq!(rounded_div(134, 3), 45);
        assert_eq!(rounded_div(10, 0), 0);
        assert_eq!(rounded_div(89, 60), 1);
        assert_eq!(rounded_div(90, 60), 2);
    }

    #[test]
    fn stats_serialize_camel_case() {
        let day = DailyTotal {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            minutes: 30,
            sessions: 1,
        };
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["date"], "2025-06-01");
        assert_eq!(json["minutes"], 30);

        let week = WeeklyTotal {
            week_start: NaiveDate::from_ymd_opt(2025, 5, 26).unwrap(),
            minutes: 0,
        };
        let json = serde_json::to_value(&week).unwrap();
        assert_eq!(json["weekStart"], "2025-05-26");
    }
}
