//! Advice request shaping and response handling
//!
//! The trailing 30 days are reduced to a [`StudyPattern`], wrapped with goal
//! and profile context into an [`AdviceRequest`] and handed to an
//! [`AdviceGenerator`]. A response that does not parse is replaced by a
//! deterministic fallback built from the pattern.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use studylog_api::{
    rounded_div, AdviceRequest, AdviceResponse, Goal, GoalSummary, LongTermPrediction, PlanItem,
    Profile, RecentSession, StudyPattern, StudySession, SubjectCatalog, Trend, WeeklyGoalProgress,
};
use studylog_util::{local_date, SubjectId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Days of history summarized into a pattern
pub const ADVICE_WINDOW_DAYS: i64 = 30;

/// Days in each half of the trend comparison
pub const TREND_WINDOW_DAYS: i64 = 7;

/// Sessions listed in the request payload
pub const RECENT_SESSION_LIMIT: usize = 14;

/// Subject label for sessions outside the catalog
pub const UNKNOWN_SUBJECT: &str = "Unknown";

/// Plan subject used when no weak subject is known
pub const FALLBACK_PLAN_SUBJECT: &str = "Fundamentals";

/// Advice errors
#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("Advice API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<AdviceError> for studylog_util::StudyError {
    fn from(e: AdviceError) -> Self {
        studylog_util::StudyError::advice(e.to_string())
    }
}

/// Produces raw advice text for a request.
///
/// Implementations return the generator's message content unparsed;
/// [`request_advice`] handles parsing and the fallback.
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate(&self, request: &AdviceRequest) -> Result<String, AdviceError>;
}

/// Ask `generator` for advice, substituting the fallback when the reply
/// does not parse. Transport failures are returned as errors.
pub async fn request_advice(
    generator: &dyn AdviceGenerator,
    request: &AdviceRequest,
) -> Result<AdviceResponse, AdviceError> {
    let raw = generator.generate(request).await?;
    Ok(resolve_advice(&raw, &request.study_pattern))
}

/// Parse `raw`, or fall back to [`fallback_advice`]
pub fn resolve_advice(raw: &str, pattern: &StudyPattern) -> AdviceResponse {
    match parse_advice_response(raw) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, raw_len = raw.len(), "Advice response unparsable, using fallback");
            fallback_advice(pattern)
        }
    }
}

/// Parse an advice reply, ignoring markdown code fences around the JSON
pub fn parse_advice_response(raw: &str) -> Result<AdviceResponse, AdviceError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| AdviceError::InvalidResponse(e.to_string()))
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Deterministic advice derived only from `pattern`
pub fn fallback_advice(pattern: &StudyPattern) -> AdviceResponse {
    let base = if pattern.average_study_time == 0 {
        60
    } else {
        pattern.average_study_time
    };
    let plan_minutes = rounded_div(base * 4, 5).max(30);
    let improving = pattern.recent_trend == Trend::Improving;

    AdviceResponse {
        todays_plan: vec![PlanItem {
            subject: pattern
                .weak_subjects
                .first()
                .cloned()
                .unwrap_or_else(|| FALLBACK_PLAN_SUBJECT.to_string()),
            duration: saturating_u32(plan_minutes),
            reason: "Focus on strengthening your weakest area.".to_string(),
        }],
        weekly_goal_progress: WeeklyGoalProgress {
            on_track: improving,
            message: if improving {
                "You are making steady progress!".to_string()
            } else {
                "A small adjustment may help.".to_string()
            },
            adjustment_needed: if pattern.recent_trend == Trend::Declining {
                30
            } else {
                0
            },
        },
        efficiency_tips: vec![
            format!(
                "Make use of your most productive time ({}).",
                pattern.productive_time_label()
            ),
            "Short sessions count; consistency matters most.".to_string(),
            "Put extra time into your weak subjects.".to_string(),
        ],
        motivational_message: "Every session brings you one step closer to your goal. Keep going!"
            .to_string(),
        long_term_prediction: LongTermPrediction {
            goal_achievable: true,
            estimated_date: None,
            recommended_pace: saturating_u32(base.max(60)),
        },
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Classify recent volume against the previous period.
///
/// Improving above 1.2x, declining below 0.8x, otherwise stable.
pub fn classify_trend(recent: u64, previous: u64) -> Trend {
    let (recent, previous) = (u128::from(recent), u128::from(previous));
    if recent * 5 > previous * 6 {
        Trend::Improving
    } else if recent * 5 < previous * 4 {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Closed sessions in `[reference_now - 30 days, reference_now]`, newest first
fn advice_window<'a, Tz: TimeZone>(
    sessions: &'a [StudySession],
    reference_now: &DateTime<Tz>,
) -> Vec<&'a StudySession> {
    let now = reference_now.with_timezone(&Utc);
    let since = now - Duration::days(ADVICE_WINDOW_DAYS);

    let mut window: Vec<&StudySession> = sessions
        .iter()
        .filter(|s| s.is_closed() && s.started_at >= since && s.started_at <= now)
        .collect();
    window.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
    window
}

/// Summarize the trailing 30 days before `reference_now`
pub fn study_pattern<Tz: TimeZone>(
    sessions: &[StudySession],
    reference_now: &DateTime<Tz>,
    subjects: &SubjectCatalog,
) -> StudyPattern {
    pattern_of(&advice_window(sessions, reference_now), reference_now, subjects)
}

fn pattern_of<Tz: TimeZone>(
    window: &[&StudySession],
    reference_now: &DateTime<Tz>,
    subjects: &SubjectCatalog,
) -> StudyPattern {
    let tz = reference_now.timezone();
    let now = reference_now.with_timezone(&Utc);

    let total: u64 = window.iter().map(|s| s.minutes()).sum();

    let mut hour_counts = [0u32; 24];
    for s in window {
        hour_counts[s.started_at.with_timezone(&tz).hour() as usize] += 1;
    }
    let mut most_productive_hour = None;
    for (hour, count) in hour_counts.iter().enumerate() {
        if *count > 0 && most_productive_hour.is_none_or(|h: usize| *count > hour_counts[h]) {
            most_productive_hour = Some(hour);
        }
    }

    let mut by_subject: BTreeMap<&SubjectId, u64> = BTreeMap::new();
    for s in window {
        if let Some(id) = &s.subject_id
            && subjects.get(id).is_some()
        {
            *by_subject.entry(id).or_default() += s.minutes();
        }
    }
    let mut ranked: Vec<(String, u64)> = by_subject
        .into_iter()
        .map(|(id, minutes)| (subjects.name_of(id).to_string(), minutes))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let strong_subjects = ranked.iter().take(2).map(|(name, _)| name.clone()).collect();
    let weak_subjects = ranked.iter().rev().take(2).map(|(name, _)| name.clone()).collect();

    let study_days: BTreeSet<_> = window.iter().map(|s| local_date(&s.started_at, &tz)).collect();

    let recent_start = now - Duration::days(TREND_WINDOW_DAYS);
    let previous_start = now - Duration::days(TREND_WINDOW_DAYS * 2);
    let recent: u64 = window
        .iter()
        .filter(|s| s.started_at >= recent_start)
        .map(|s| s.minutes())
        .sum();
    let previous: u64 = window
        .iter()
        .filter(|s| s.started_at >= previous_start && s.started_at < recent_start)
        .map(|s| s.minutes())
        .sum();

    StudyPattern {
        average_study_time: rounded_div(total, window.len() as u64),
        most_productive_hour: most_productive_hour.map(|h| h as u32),
        strong_subjects,
        weak_subjects,
        study_frequency: rounded_div(study_days.len() as u64 * 7, ADVICE_WINDOW_DAYS as u64),
        recent_trend: classify_trend(recent, previous),
    }
}

/// Build the payload handed to an advice generator
pub fn build_advice_request<Tz: TimeZone>(
    sessions: &[StudySession],
    goals: &[Goal],
    profile: &Profile,
    reference_now: &DateTime<Tz>,
    subjects: &SubjectCatalog,
) -> AdviceRequest {
    let tz = reference_now.timezone();
    let window = advice_window(sessions, reference_now);
    let study_pattern = pattern_of(&window, reference_now, subjects);

    let recent_sessions = window
        .iter()
        .take(RECENT_SESSION_LIMIT)
        .map(|s| {
            let local = s.started_at.with_timezone(&tz);
            RecentSession {
                date: local.date_naive(),
                subject: s
                    .subject_id
                    .as_ref()
                    .and_then(|id| subjects.get(id))
                    .map_or_else(|| UNKNOWN_SUBJECT.to_string(), |subject| subject.name.clone()),
                duration: s.duration_minutes,
                day_of_week: weekday_name(local.weekday()).to_string(),
            }
        })
        .collect();

    let goals: Vec<GoalSummary> = goals
        .iter()
        .filter(|g| g.is_active)
        .map(|g| GoalSummary {
            goal_type: g.goal_type,
            target_minutes: g.target_minutes,
            subject_id: g.subject_id.clone(),
        })
        .collect();

    debug!(
        window_sessions = window.len(),
        goals = goals.len(),
        "Advice request built"
    );

    AdviceRequest {
        profile: profile.clone(),
        study_pattern,
        goals,
        recent_sessions,
    }
}
