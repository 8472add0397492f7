//! Time utilities for studylog
//!
//! Provides monotonic time (for the stopwatch), wall-clock time (for session
//! timestamps) and calendar periods (for aggregation windows).
//!
//! # Mock Time for Development
//!
//! In debug builds, the `STUDYLOG_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for checking streaks and period boundaries against a known date.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! STUDYLOG_MOCK_TIME="2025-12-25 14:30:00" studylog stats
//! ```

use chrono::{
    DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "STUDYLOG_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };

            match Local.from_local_datetime(&naive_dt).earliest() {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(chrono::Local::now());
                    tracing::info!(
                        mock_time = %mock_time_str,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        "Failed to convert mock time to local timezone"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// [`now`] as a UTC instant, the form sessions are stored in.
pub fn now_utc() -> DateTime<Utc> {
    now().with_timezone(&Utc)
}

/// Represents a point in monotonic time for the stopwatch.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.duration_since(earlier.0)
    }

    /// Duration since `earlier`, or zero if `earlier` is actually later
    pub fn saturating_duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// Calendar date of `instant` as seen in `tz`
pub fn local_date<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// `date` moved `n` days into the past, clamped at the calendar minimum
pub fn days_before(date: NaiveDate, n: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}

/// Ordinal of a weekday with Sunday = 0 through Saturday = 6
pub fn weekday_ordinal(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

/// A half-open range of calendar days, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The single day `date`
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX),
        }
    }

    /// The ISO week (Monday through Sunday) containing `date`
    pub fn week(date: NaiveDate) -> Self {
        let start = week_start(date);
        Self {
            start,
            end: start.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX),
        }
    }

    /// The calendar month containing `date`
    pub fn month(date: NaiveDate) -> Self {
        let start = month_start(date);
        Self {
            start,
            end: start.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Render whole seconds as `HH:MM:SS`.
///
/// Every field is padded to two digits; hours grow past 99 rather than wrap.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Helper to format a minute count in human-readable form
pub fn format_minutes(minutes: u64) -> String {
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}h", hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(100 * 3600 + 5), "100:00:05");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(120), "2h");
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2025-12-25 is a Thursday
        assert_eq!(week_start(date(2025, 12, 25)), date(2025, 12, 22));
        assert_eq!(week_start(date(2025, 12, 22)), date(2025, 12, 22));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(week_start(date(2025, 12, 28)), date(2025, 12, 22));
    }

    #[test]
    fn test_week_period_spans_year_boundary() {
        let week = Period::week(date(2026, 1, 1));
        assert_eq!(week.start, date(2025, 12, 29));
        assert_eq!(week.end, date(2026, 1, 5));
        assert!(week.contains(date(2025, 12, 31)));
        assert!(!week.contains(date(2026, 1, 5)));
    }

    #[test]
    fn test_month_period() {
        let month = Period::month(date(2024, 2, 17));
        assert_eq!(month.start, date(2024, 2, 1));
        assert_eq!(month.end, date(2024, 3, 1));
        assert!(month.contains(date(2024, 2, 29)));
        assert!(!month.contains(date(2024, 1, 31)));
    }

    #[test]
    fn test_day_period_is_half_open() {
        let day = Period::day(date(2025, 6, 1));
        assert!(day.contains(date(2025, 6, 1)));
        assert!(!day.contains(date(2025, 6, 2)));
        assert!(!day.contains(date(2025, 5, 31)));
    }

    #[test]
    fn test_local_date_uses_timezone() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(local_date(&instant, &Utc), date(2025, 6, 1));
        assert_eq!(local_date(&instant, &tokyo), date(2025, 6, 2));
    }

    #[test]
    fn test_weekday_ordinal_starts_on_sunday() {
        assert_eq!(weekday_ordinal(Weekday::Sun), 0);
        assert_eq!(weekday_ordinal(Weekday::Mon), 1);
        assert_eq!(weekday_ordinal(Weekday::Sat), 6);
    }

    #[test]
    fn test_monotonic_instant() {
        let t1 = MonotonicInstant::now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = MonotonicInstant::now();

        assert!(t2 > t1);
        assert!(t2.duration_since(t1) >= Duration::from_millis(10));
        assert_eq!(t1.saturating_duration_since(t2), Duration::ZERO);
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_parse_mock_time_format() {
        let valid = ["2025-12-25 14:30:00", "2025-01-01 00:00:00", "2025-12-31 23:59:59"];
        for s in &valid {
            assert!(
                NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT).is_ok(),
                "Expected '{}' to parse",
                s
            );
        }

        let invalid = ["2025-12-25", "14:30:00", "2025-12-25T14:30:00", ""];
        for s in &invalid {
            assert!(
                NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT).is_err(),
                "Expected '{}' to be rejected",
                s
            );
        }
    }
}
