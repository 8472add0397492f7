//! Dashboard statistics over a session snapshot
//!
//! Pure: the caller supplies the sessions, the reference instant (whose
//! timezone defines calendar days) and the subject lookup. Identical input
//! yields identical output.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Weekday};
use studylog_api::{
    percent_of, rounded_div, CalendarDay, DailyTotal, DerivedStats, StudySession, SubjectCatalog,
    SubjectRank, WeeklyTotal,
};
use studylog_util::{days_before, local_date, week_start, weekday_ordinal, Period, SubjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// Length of the trailing daily window
pub const DAILY_WINDOW_DAYS: u64 = 7;

/// Length of the trailing weekly window
pub const WEEKLY_WINDOW_WEEKS: u64 = 8;

/// Weekdays indexed by their Sunday-based ordinal
const WEEKDAYS_FROM_SUNDAY: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DayBucket {
    minutes: u64,
    sessions: u32,
}

/// Compute dashboard statistics for `sessions` as of `reference_now`.
///
/// Open sessions are skipped.
pub fn aggregate<Tz: TimeZone>(
    sessions: &[StudySession],
    reference_now: &DateTime<Tz>,
    subjects: &SubjectCatalog,
) -> DerivedStats {
    let tz = reference_now.timezone();
    let today = reference_now.date_naive();
    let today_period = Period::day(today);
    let week_period = Period::week(today);
    let month_period = Period::month(today);

    let mut today_minutes = 0u64;
    let mut week_minutes = 0u64;
    let mut month_minutes = 0u64;
    let mut total_minutes = 0u64;
    let mut today_sessions = 0u32;
    let mut by_day: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    let mut by_subject: BTreeMap<&SubjectId, u64> = BTreeMap::new();
    let mut by_weekday = [0u64; 7];
    let mut skipped_open = 0usize;

    for session in sessions {
        if !session.is_closed() {
            skipped_open += 1;
            continue;
        }

        let date = local_date(&session.started_at, &tz);
        let minutes = session.minutes();

        total_minutes += minutes;
        if today_period.contains(date) {
            today_minutes += minutes;
            today_sessions += 1;
        }
        if week_period.contains(date) {
            week_minutes += minutes;
        }
        if month_period.contains(date) {
            month_minutes += minutes;
        }

        let bucket = by_day.entry(date).or_default();
        bucket.minutes += minutes;
        bucket.sessions += 1;

        by_weekday[weekday_ordinal(date.weekday()) as usize] += minutes;

        if let Some(subject_id) = &session.subject_id {
            *by_subject.entry(subject_id).or_default() += minutes;
        }
    }

    if skipped_open > 0 {
        debug!(skipped_open, "Open sessions excluded from aggregation");
    }

    DerivedStats {
        today_minutes,
        week_minutes,
        month_minutes,
        total_minutes,
        total_hours: rounded_div(total_minutes, 60),
        today_sessions,
        streak: streak(&by_day, today),
        subject_ranking: ranking(by_subject, total_minutes, subjects),
        daily: daily_window(&by_day, today),
        weekly: weekly_window(&by_day, today),
        calendar: calendar(&by_day),
        most_productive_weekday: most_productive_weekday(&by_weekday),
        average_minutes_per_day: rounded_div(total_minutes, by_day.len() as u64),
    }
}

/// Heatmap intensity of a day relative to the busiest day: 0 for no study,
/// then 1..=4 split at 25%, 50% and 75% of `max_minutes`.
pub fn heat_level(minutes: u64, max_minutes: u64) -> u8 {
    if minutes == 0 || max_minutes == 0 {
        return 0;
    }
    let (m, max) = (u128::from(minutes), u128::from(max_minutes));
    if m * 4 > max * 3 {
        4
    } else if m * 2 > max {
        3
    } else if m * 4 > max {
        2
    } else {
        1
    }
}

fn streak(by_day: &BTreeMap<NaiveDate, DayBucket>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = today;
    while by_day.get(&day).is_some_and(|b| b.sessions > 0) {
        streak += 1;
        match day.checked_sub_days(Days::new(1)) {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

fn ranking(
    by_subject: BTreeMap<&SubjectId, u64>,
    total_minutes: u64,
    subjects: &SubjectCatalog,
) -> Vec<SubjectRank> {
    // BTreeMap order plus a stable sort breaks ties by subject id
    let mut rows: Vec<(&SubjectId, u64)> = by_subject.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    rows.into_iter()
        .enumerate()
        .map(|(i, (subject_id, minutes))| SubjectRank {
            rank: i as u32 + 1,
            subject_id: subject_id.clone(),
            subject_name: subjects.name_of(subject_id).to_string(),
            subject_color: subjects.color_of(subject_id).to_string(),
            total_minutes: minutes,
            percentage: percent_of(minutes, total_minutes),
        })
        .collect()
}

fn daily_window(by_day: &BTreeMap<NaiveDate, DayBucket>, today: NaiveDate) -> Vec<DailyTotal> {
    (0..DAILY_WINDOW_DAYS)
        .rev()
        .map(|back| {
            let date = days_before(today, back);
            let bucket = by_day.get(&date).copied().unwrap_or_default();
            DailyTotal {
                date,
                minutes: bucket.minutes,
                sessions: bucket.sessions,
            }
        })
        .collect()
}

fn weekly_window(by_day: &BTreeMap<NaiveDate, DayBucket>, today: NaiveDate) -> Vec<WeeklyTotal> {
    let current = week_start(today);
    (0..WEEKLY_WINDOW_WEEKS)
        .rev()
        .map(|back| {
            let period = Period::week(days_before(current, back * 7));
            let minutes = by_day
                .range(period.start..period.end)
                .map(|(_, b)| b.minutes)
                .sum();
            WeeklyTotal {
                week_start: period.start,
                minutes,
            }
        })
        .collect()
}

fn calendar(by_day: &BTreeMap<NaiveDate, DayBucket>) -> Vec<CalendarDay> {
    let max = by_day.values().map(|b| b.minutes).max().unwrap_or(0);
    by_day
        .iter()
        .map(|(date, bucket)| CalendarDay {
            date: *date,
            minutes: bucket.minutes,
            sessions: bucket.sessions,
            level: heat_level(bucket.minutes, max),
        })
        .collect()
}

fn most_productive_weekday(by_weekday: &[u64; 7]) -> Option<Weekday> {
    let mut best: Option<usize> = None;
    for (ordinal, minutes) in by_weekday.iter().enumerate() {
        // Strictly greater keeps the lowest ordinal on ties
        if *minutes > 0 && best.is_none_or(|b| *minutes > by_weekday[b]) {
            best = Some(ordinal);
        }
    }
    best.map(|ordinal| WEEKDAYS_FROM_SUNDAY[ordinal])
}
