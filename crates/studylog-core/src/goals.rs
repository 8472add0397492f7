//! Goal progress over the goal's current period

use chrono::{DateTime, NaiveDate, TimeZone};
use studylog_api::{percent_of, Achievements, Goal, GoalProgress, GoalType, StudySession, SubjectCatalog};
use studylog_util::{local_date, GoalId, Period};
use std::collections::HashSet;

/// Calendar window a goal of `goal_type` measures on `today`
pub fn goal_period(goal_type: GoalType, today: NaiveDate) -> Period {
    match goal_type {
        GoalType::Daily => Period::day(today),
        GoalType::Weekly => Period::week(today),
        GoalType::Monthly => Period::month(today),
    }
}

/// Progress for every active goal, in input order.
///
/// Inactive goals and open sessions are skipped.
pub fn goal_progress<Tz: TimeZone>(
    goals: &[Goal],
    sessions: &[StudySession],
    reference_now: &DateTime<Tz>,
    subjects: &SubjectCatalog,
) -> Vec<GoalProgress> {
    let tz = reference_now.timezone();
    let today = reference_now.date_naive();

    let closed: Vec<(NaiveDate, &StudySession)> = sessions
        .iter()
        .filter(|s| s.is_closed())
        .map(|s| (local_date(&s.started_at, &tz), s))
        .collect();

    goals
        .iter()
        .filter(|g| g.is_active)
        .map(|goal| {
            let period = goal_period(goal.goal_type, today);
            let achieved: u64 = closed
                .iter()
                .filter(|(date, _)| period.contains(*date))
                .filter(|(_, s)| goal.subject_id.is_none() || s.subject_id == goal.subject_id)
                .map(|(_, s)| s.minutes())
                .sum();

            let target = u64::from(goal.target_minutes);
            let subject = goal.subject_id.as_ref().and_then(|id| subjects.get(id));

            GoalProgress {
                goal_id: goal.id.clone(),
                goal_type: goal.goal_type,
                subject_id: goal.subject_id.clone(),
                target_minutes: goal.target_minutes,
                achieved_minutes: achieved,
                percentage: percent_of(achieved, target).min(100),
                is_completed: achieved >= target,
                subject_name: subject.map(|s| s.name.clone()),
                subject_color: subject.map(|s| s.color.clone()),
            }
        })
        .collect()
}

pub fn achievements(progress: &[GoalProgress]) -> Achievements {
    let mut daily = progress.iter().filter(|p| p.goal_type == GoalType::Daily).peekable();
    let has_daily = daily.peek().is_some();
    Achievements {
        first_goal: progress.iter().any(|p| p.is_completed),
        perfect_day: has_daily && daily.all(|p| p.is_completed),
    }
}

/// Remembers which goals were already announced as completed on which day
#[derive(Debug, Default)]
pub struct GoalCompletionNotices {
    announced: HashSet<(GoalId, NaiveDate)>,
}

impl GoalCompletionNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed goals in `progress` not yet announced on `today`.
    /// Each returned goal is recorded as announced.
    pub fn newly_completed<'a>(
        &mut self,
        progress: &'a [GoalProgress],
        today: NaiveDate,
    ) -> Vec<&'a GoalProgress> {
        progress
            .iter()
            .filter(|p| p.is_completed)
            .filter(|p| self.announced.insert((p.goal_id.clone(), today)))
            .collect()
    }
}
