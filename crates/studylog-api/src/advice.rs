//! Advice request and response payloads.
//!
//! The request is handed to an advice generator as opaque JSON; the response
//! is parsed back into [`AdviceResponse`] and passed to the presentation layer
//! unmodified.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use studylog_util::SubjectId;
use std::fmt;

use crate::{GoalType, Profile};

/// Direction of recent study volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact summary of the trailing 30 days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPattern {
    /// Mean minutes per session
    pub average_study_time: u64,
    /// Local hour (0..=23) in which most sessions started
    pub most_productive_hour: Option<u32>,
    /// Subject names, strongest first
    pub strong_subjects: Vec<String>,
    /// Subject names, weakest first
    pub weak_subjects: Vec<String>,
    /// Distinct study days per week
    pub study_frequency: u64,
    pub recent_trend: Trend,
}

impl StudyPattern {
    /// Human label for the productive hour, e.g. "around 14:00"
    pub fn productive_time_label(&self) -> String {
        match self.most_productive_hour {
            Some(hour) => format!("around {:02}:00", hour),
            None => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target_minutes: u32,
    pub subject_id: Option<SubjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    pub date: NaiveDate,
    /// Subject name, or "Unknown"
    pub subject: String,
    pub duration: Option<u32>,
    /// English weekday name ("Monday")
    pub day_of_week: String,
}

/// Payload handed to an advice generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub profile: Profile,
    pub study_pattern: StudyPattern,
    pub goals: Vec<GoalSummary>,
    /// Most recent first, at most 14
    pub recent_sessions: Vec<RecentSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub subject: String,
    pub duration: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoalProgress {
    pub on_track: bool,
    pub message: String,
    pub adjustment_needed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTermPrediction {
    pub goal_achievable: bool,
    /// `YYYY-MM-DD` or null
    pub estimated_date: Option<String>,
    /// Recommended minutes per day
    pub recommended_pace: u32,
}

/// Structured advice returned by a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceResponse {
    pub todays_plan: Vec<PlanItem>,
    pub weekly_goal_progress: WeeklyGoalProgress,
    pub efficiency_tips: Vec<String>,
    pub motivational_message: String,
    pub long_term_prediction: LongTermPrediction,
}
