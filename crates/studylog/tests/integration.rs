//! Integration tests for studylog
//!
//! These tests drive the tracker end to end over an on-disk store.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use studylog_api::{AdviceRequest, GoalType};
use studylog_config::{TimezonePolicy, parse_config};
use studylog_core::{AdviceError, AdviceGenerator, CoreEvent, StudyTracker, request_advice};
use studylog_store::{SqliteStore, Store};
use studylog_util::MonotonicInstant;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r##"
config_version = 1

[service]
user_id = "student"
timezone = "Asia/Tokyo"

[profile]
grade = "11"

[[subjects]]
id = "math"
name = "Math"
color = "#3B82F6"

[[subjects]]
id = "english"
name = "English"
color = "#EF4444"
"##;

fn tokyo() -> Tz {
    match parse_config(CONFIG).unwrap().service.timezone {
        TimezonePolicy::Named(tz) => tz,
        TimezonePolicy::Local => panic!("expected a named timezone"),
    }
}

fn jst(tz: &Tz, d: u32, h: u32, m: u32) -> DateTime<Utc> {
    let month = if d > 20 { 5 } else { 6 };
    tz.with_ymd_and_hms(2025, month, d, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn open_tracker(path: &std::path::Path) -> StudyTracker {
    let settings = parse_config(CONFIG).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(path).unwrap());
    let tracker = StudyTracker::new(store, settings.service.user_id.clone());
    tracker.seed_subjects(&settings.subjects).unwrap();
    tracker
}

/// Four sessions across a week, one of them before UTC midnight but on
/// the Tokyo "today"
fn record_week(tracker: &StudyTracker, tz: &Tz) {
    let sessions = [
        ("math", jst(tz, 4, 8, 0), 30),
        ("english", jst(tz, 3, 20, 0), 60),
        ("math", jst(tz, 2, 19, 0), 45),
        ("math", jst(tz, 31, 10, 0), 20),
    ];
    for (subject, start, minutes) in sessions {
        tracker
            .record_manual(
                Some(subject.into()),
                start,
                start + ChronoDuration::minutes(minutes),
                None,
            )
            .unwrap();
    }
}

#[test]
fn test_dashboard_in_configured_timezone() {
    let dir = tempfile::tempdir().unwrap();
    let tz = tokyo();
    let tracker = open_tracker(&dir.path().join("studylog.db"));
    record_week(&tracker, &tz);

    let now = tz.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap();
    let stats = tracker.dashboard(&now).unwrap();

    assert_eq!(stats.today_minutes, 30);
    assert_eq!(stats.today_sessions, 1);
    assert_eq!(stats.week_minutes, 135);
    assert_eq!(stats.month_minutes, 135);
    assert_eq!(stats.total_minutes, 155);
    assert_eq!(stats.streak, 3);
    assert_eq!(stats.average_minutes_per_day, 39);
    assert_eq!(stats.most_productive_weekday, Some(Weekday::Tue));

    let ranking: Vec<(&str, u64, u32)> = stats
        .subject_ranking
        .iter()
        .map(|r| (r.subject_name.as_str(), r.total_minutes, r.percentage))
        .collect();
    assert_eq!(ranking, vec![("Math", 95, 61), ("English", 60, 39)]);

    assert_eq!(stats.daily.len(), 7);
    assert_eq!(stats.daily.last().unwrap().minutes, 30);
    assert_eq!(stats.weekly.len(), 8);
    assert_eq!(stats.weekly.last().unwrap().minutes, 135);
}

#[test]
fn test_dashboard_json_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let tz = tokyo();
    let tracker = open_tracker(&dir.path().join("studylog.db"));
    record_week(&tracker, &tz);

    let now = tz.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap();
    let first = serde_json::to_string(&tracker.dashboard(&now).unwrap()).unwrap();
    let second = serde_json::to_string(&tracker.dashboard(&now).unwrap()).unwrap();

    assert_eq!(first, second);
    assert!(first.contains("\"todayMinutes\":30"));
    assert!(first.contains("\"subjectRanking\""));
}

#[test]
fn test_timer_session_persists_and_completes_goal() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("studylog.db");
    let tz = tokyo();

    let started_at = jst(&tz, 4, 19, 0);
    let t0 = MonotonicInstant::now();
    {
        let mut tracker = open_tracker(&db_path);
        tracker.create_goal(GoalType::Daily, 30, Some("math".into())).unwrap();

        tracker.start(Some("math".into()), started_at, t0).unwrap();
        tracker.pause(t0 + Duration::from_secs(25 * 60)).unwrap();
        tracker.resume(t0 + Duration::from_secs(40 * 60)).unwrap();
        assert_eq!(tracker.tick(t0 + Duration::from_secs(45 * 60)), 30 * 60);

        let events = tracker
            .stop(
                Some("algebra".into()),
                started_at + ChronoDuration::minutes(45) + ChronoDuration::seconds(1),
                t0 + Duration::from_secs(45 * 60 + 1),
            )
            .unwrap();
        assert!(matches!(
            events[0],
            CoreEvent::SessionClosed { duration_minutes: 31, .. }
        ));

        let now = started_at.with_timezone(&tz) + ChronoDuration::hours(1);
        let (progress, completed) = tracker.goal_progress(&now).unwrap();
        assert_eq!(progress[0].achieved_minutes, 31);
        assert_eq!(progress[0].percentage, 100);
        assert_eq!(progress[0].subject_name.as_deref(), Some("Math"));
        assert_eq!(completed.len(), 1);
    }

    // A fresh process sees the closed session and the goal
    let tracker = open_tracker(&db_path);
    let sessions = tracker.sessions(None).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_minutes, Some(31));
    assert_eq!(sessions[0].notes.as_deref(), Some("algebra"));
    assert!(tracker.stale_open_sessions().unwrap().is_empty());
    assert_eq!(tracker.goals().unwrap().len(), 1);
}

#[test]
fn test_crashed_timer_leaves_stale_session() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("studylog.db");
    let tz = tokyo();

    {
        let mut tracker = open_tracker(&db_path);
        tracker
            .start(None, jst(&tz, 4, 7, 0), MonotonicInstant::now())
            .unwrap();
        // Dropped without stopping
    }

    let tracker = open_tracker(&db_path);
    assert_eq!(tracker.stale_open_sessions().unwrap().len(), 1);

    let now = tz.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap();
    let stats = tracker.dashboard(&now).unwrap();
    assert_eq!(stats.total_minutes, 0);
    assert_eq!(stats.streak, 0);
}

/// Generator that replies with a fixed string
struct CannedGenerator(&'static str);

#[async_trait]
impl AdviceGenerator for CannedGenerator {
    async fn generate(&self, _request: &AdviceRequest) -> Result<String, AdviceError> {
        Ok(self.0.to_string())
    }
}

/// Generator whose transport always fails
struct OfflineGenerator;

#[async_trait]
impl AdviceGenerator for OfflineGenerator {
    async fn generate(&self, _request: &AdviceRequest) -> Result<String, AdviceError> {
        Err(AdviceError::Network("connection refused".into()))
    }
}

#[tokio::test]
async fn test_advice_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let tz = tokyo();
    let settings = parse_config(CONFIG).unwrap();
    let mut tracker = open_tracker(&dir.path().join("studylog.db"));
    record_week(&tracker, &tz);
    tracker.create_goal(GoalType::Weekly, 300, None).unwrap();

    let now = tz.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap();
    let request = tracker.advice_request(&now, &settings.profile).unwrap();

    assert_eq!(request.profile.grade.as_deref(), Some("11"));
    assert_eq!(request.study_pattern.average_study_time, 39);
    assert_eq!(request.study_pattern.most_productive_hour, Some(8));
    assert_eq!(request.study_pattern.strong_subjects, vec!["Math", "English"]);
    assert_eq!(request.study_pattern.weak_subjects, vec!["English", "Math"]);
    assert_eq!(request.study_pattern.study_frequency, 1);
    assert_eq!(request.goals.len(), 1);
    assert_eq!(request.recent_sessions.len(), 4);
    assert_eq!(request.recent_sessions[0].day_of_week, "Wednesday");
    assert_eq!(request.recent_sessions[0].date.to_string(), "2025-06-04");

    let fenced = CannedGenerator(
        r#"```json
{
  "todaysPlan": [{"subject": "English", "duration": 40, "reason": "lowest total"}],
  "weeklyGoalProgress": {"onTrack": false, "message": "165 minutes to go", "adjustmentNeeded": 25},
  "efficiencyTips": ["Review vocabulary in the morning"],
  "motivationalMessage": "Keep it up",
  "longTermPrediction": {"goalAchievable": true, "estimatedDate": null, "recommendedPace": 45}
}
```"#,
    );
    let advice = request_advice(&fenced, &request).await.unwrap();
    assert_eq!(advice.todays_plan[0].duration, 40);
    assert_eq!(advice.weekly_goal_progress.adjustment_needed, 25);

    let garbled = CannedGenerator("Sorry, I can't help with that.");
    let fallback = request_advice(&garbled, &request).await.unwrap();
    assert_eq!(fallback.todays_plan[0].subject, "English");
    assert_eq!(fallback.todays_plan[0].duration, 31);
    assert!(fallback.weekly_goal_progress.on_track);
    assert_eq!(fallback.long_term_prediction.recommended_pace, 60);

    let result = request_advice(&OfflineGenerator, &request).await;
    assert!(matches!(result, Err(AdviceError::Network(_))));

    // The unmet weekly goal produces no notice
    let (_, events) = tracker.goal_progress(&now).unwrap();
    assert!(events.is_empty());
}
