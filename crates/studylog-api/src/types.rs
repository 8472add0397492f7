//! Record types shared by the store, the core and the presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studylog_util::{GoalId, SessionId, SubjectId, UserId};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Display name used for sessions whose subject is missing from the catalog
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Display color used for sessions whose subject is missing from the catalog
pub const UNCATEGORIZED_COLOR: &str = "#9CA3AF";

/// One timed study interval.
///
/// A session is open (`ended_at == None`) while its timer runs and is closed
/// exactly once when the timer stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: SessionId,
    pub user_id: UserId,
    pub subject_id: Option<SubjectId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Authoritative duration; may be rounded up relative to the timestamps
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

impl StudySession {
    /// A new open session starting at `started_at`
    pub fn open(
        user_id: UserId,
        subject_id: Option<SubjectId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            subject_id,
            started_at,
            ended_at: None,
            duration_minutes: None,
            notes: None,
        }
    }

    /// A closed session covering `[started_at, ended_at]`, as entered by hand
    pub fn closed(
        user_id: UserId,
        subject_id: Option<SubjectId>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            subject_id,
            started_at,
            ended_at: Some(ended_at),
            duration_minutes: Some(minutes_between(started_at, ended_at)),
            notes,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Minutes counted by aggregation (`None` counts as zero)
    pub fn minutes(&self) -> u64 {
        u64::from(self.duration_minutes.unwrap_or(0))
    }
}

/// Minutes recorded for a stopped timer: whole minutes, rounded up
pub fn minutes_for_elapsed(elapsed: Duration) -> u32 {
    let secs = elapsed.as_secs();
    u32::try_from(secs.div_ceil(60)).unwrap_or(u32::MAX)
}

/// Minutes recorded for a manually entered interval, rounded up.
/// An interval that ends before it starts records zero.
pub fn minutes_between(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u32 {
    match (ended_at - started_at).to_std() {
        Ok(elapsed) => minutes_for_elapsed(elapsed),
        Err(_) => 0,
    }
}

/// A subject sessions and goals can refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Display hint, echoed back untouched
    pub color: String,
    /// Shared catalog entry rather than user-defined
    pub is_preset: bool,
}

/// Subject lookup used to label aggregation output.
///
/// May be partial; unknown ids render as [`UNCATEGORIZED_NAME`].
#[derive(Debug, Clone, Default)]
pub struct SubjectCatalog {
    subjects: BTreeMap<SubjectId, Subject>,
}

impl SubjectCatalog {
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            subjects: subjects.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn get(&self, id: &SubjectId) -> Option<&Subject> {
        self.subjects.get(id)
    }

    pub fn name_of(&self, id: &SubjectId) -> &str {
        self.get(id).map_or(UNCATEGORIZED_NAME, |s| s.name.as_str())
    }

    pub fn color_of(&self, id: &SubjectId) -> &str {
        self.get(id).map_or(UNCATEGORIZED_COLOR, |s| s.color.as_str())
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }
}

/// Goal period type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Daily,
    Weekly,
    Monthly,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Daily => "daily",
            GoalType::Weekly => "weekly",
            GoalType::Monthly => "monthly",
        }
    }

    /// Label used in notifications ("today's goal")
    pub fn period_label(&self) -> &'static str {
        match self {
            GoalType::Daily => "today",
            GoalType::Weekly => "this week",
            GoalType::Monthly => "this month",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown goal type '{0}' (expected daily, weekly or monthly)")]
pub struct ParseGoalTypeError(pub String);

impl FromStr for GoalType {
    type Err = ParseGoalTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(GoalType::Daily),
            "weekly" => Ok(GoalType::Weekly),
            "monthly" => Ok(GoalType::Monthly),
            other => Err(ParseGoalTypeError(other.to_string())),
        }
    }
}

/// A study goal: reach `target_minutes` within the goal's period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target_minutes: u32,
    /// Only sessions of this subject count toward the goal
    pub subject_id: Option<SubjectId>,
    pub is_active: bool,
}

impl Goal {
    pub fn new(
        user_id: UserId,
        goal_type: GoalType,
        target_minutes: u32,
        subject_id: Option<SubjectId>,
    ) -> Self {
        Self {
            id: GoalId::new(),
            user_id,
            goal_type,
            target_minutes,
            subject_id,
            is_active: true,
        }
    }
}

/// Profile context handed to the advice generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub grade: Option<String>,
    pub target_school: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timer_minutes_round_up() {
        assert_eq!(minutes_for_elapsed(Duration::ZERO), 0);
        assert_eq!(minutes_for_elapsed(Duration::from_secs(1)), 1);
        assert_eq!(minutes_for_elapsed(Duration::from_secs(60)), 1);
        assert_eq!(minutes_for_elapsed(Duration::from_secs(61)), 2);
        assert_eq!(minutes_for_elapsed(Duration::from_millis(59_999)), 1);
    }

    #[test]
    fn manual_interval_minutes() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 9, 45, 30).unwrap();
        assert_eq!(minutes_between(start, end), 46);
        assert_eq!(minutes_between(end, start), 0);
    }

    #[test]
    fn session_serializes_camel_case() {
        let started = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let session = StudySession::open(UserId::new("u1"), Some("math".into()), started);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["subjectId"], "math");
        assert!(json["endedAt"].is_null());
        assert!(!session.is_closed());
        assert_eq!(session.minutes(), 0);
    }

    #[test]
    fn goal_type_parsing() {
        assert_eq!("Weekly".parse::<GoalType>().unwrap(), GoalType::Weekly);
        assert!("yearly".parse::<GoalType>().is_err());

        let goal = Goal::new(UserId::new("u1"), GoalType::Monthly, 600, None);
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["type"], "monthly");
        assert_eq!(json["targetMinutes"], 600);
    }

    #[test]
    fn catalog_falls_back_to_uncategorized() {
        let catalog = SubjectCatalog::new([Subject {
            id: "math".into(),
            name: "Math".into(),
            color: "#3B82F6".into(),
            is_preset: true,
        }]);

        assert_eq!(catalog.name_of(&"math".into()), "Math");
        assert_eq!(catalog.name_of(&"history".into()), UNCATEGORIZED_NAME);
        assert_eq!(catalog.color_of(&"history".into()), UNCATEGORIZED_COLOR);
    }
}
