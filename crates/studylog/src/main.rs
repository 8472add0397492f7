//! studylog - study-time tracker
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization and preset subject seeding
//! - The study tracker (timer, records, derived views)
//! - The advice generator

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use studylog_api::{AdviceResponse, DerivedStats, GoalProgress, GoalType, Subject};
use studylog_config::{Settings, TimezonePolicy, load_config_or_default, parse_hex_color};
use studylog_core::{
    AdviceError, CoreEvent, OpenAiAdviceGenerator, StudyTracker, achievements, fallback_advice,
    request_advice, spawn_ticker,
};
use studylog_store::{SqliteStore, Store};
use studylog_util::{
    GoalId, MonotonicInstant, SessionId, SubjectId, default_config_path, format_hms,
    format_minutes, now_utc,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// studylog - track study time, goals and habits
#[derive(Parser, Debug)]
#[command(name = "studylog")]
#[command(about = "Track study time, goals and habits", long_about = None)]
struct Cli {
    /// Configuration file path (default: ~/.config/studylog/config.toml)
    #[arg(short, long, env = "STUDYLOG_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set STUDYLOG_DATA_DIR env var)
    #[arg(short, long, env = "STUDYLOG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the study timer (SIGUSR1 toggles pause, Ctrl-C stops and records)
    Timer {
        #[arg(short, long)]
        subject: Option<SubjectId>,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Record a session after the fact
    Log {
        #[arg(short, long)]
        subject: Option<SubjectId>,
        /// Day of the session (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_clock)]
        start: NaiveTime,
        /// End time (HH:MM)
        #[arg(long, value_parser = parse_clock)]
        end: NaiveTime,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List recorded sessions, newest first
    Sessions {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete a session
    Delete { id: SessionId },

    /// Show dashboard statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Manage goals
    #[command(subcommand)]
    Goals(GoalCommand),

    /// Manage subjects
    #[command(subcommand)]
    Subjects(SubjectCommand),

    /// Show or update the profile used for advice
    Profile {
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        target_school: Option<String>,
    },

    /// Generate study advice from the last 30 days
    Advise {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    /// Show progress for active goals
    List,
    Add {
        /// daily, weekly or monthly
        #[arg(short = 't', long = "type")]
        goal_type: GoalType,
        #[arg(short, long)]
        minutes: u32,
        #[arg(short, long)]
        subject: Option<SubjectId>,
    },
    Set {
        id: GoalId,
        #[arg(short, long)]
        minutes: Option<u32>,
        #[arg(long, conflicts_with = "inactive")]
        active: bool,
        #[arg(long)]
        inactive: bool,
    },
    Remove { id: GoalId },
}

#[derive(Subcommand, Debug)]
enum SubjectCommand {
    List,
    Add {
        id: SubjectId,
        name: String,
        #[arg(short, long, default_value = "#6B7280")]
        color: String,
    },
}

fn parse_clock(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}

struct App {
    settings: Settings,
    tracker: StudyTracker,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let mut settings = load_config_or_default(&cli.config)
            .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

        if let Some(data_dir) = &cli.data_dir {
            settings.service.data_dir = data_dir.clone();
        }

        std::fs::create_dir_all(&settings.service.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {:?}",
                settings.service.data_dir
            )
        })?;

        let db_path = settings.service.database_path();
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        let tracker = StudyTracker::new(store, settings.service.user_id.clone());
        tracker
            .seed_subjects(&settings.subjects)
            .context("Failed to seed preset subjects")?;

        let stale = tracker.stale_open_sessions()?;
        if !stale.is_empty() {
            warn!(
                count = stale.len(),
                "Sessions left open by an earlier run are not counted"
            );
        }

        Ok(Self { settings, tracker })
    }

    async fn run<Tz: TimeZone>(&mut self, command: Command, now: DateTime<Tz>) -> Result<()> {
        let tz = now.timezone();
        match command {
            Command::Timer { subject, notes } => self.run_timer(subject, notes, &tz).await,

            Command::Log {
                subject,
                date,
                start,
                end,
                notes,
            } => {
                let started_at = to_utc(&tz, date, start)?;
                let ended_at = to_utc(&tz, date, end)?;
                let (session, _) =
                    self.tracker
                        .record_manual(subject, started_at, ended_at, notes)?;
                println!(
                    "Recorded {} ({})",
                    format_minutes(session.minutes()),
                    session.id
                );
                self.announce_goals(&now)
            }

            Command::Sessions { limit } => {
                let subjects = self.tracker.subjects()?;
                for s in self.tracker.sessions(Some(limit))? {
                    let started = s.started_at.with_timezone(&tz).naive_local();
                    let subject = s
                        .subject_id
                        .as_ref()
                        .map_or("-", |id| subjects.name_of(id));
                    let duration = match s.duration_minutes {
                        Some(m) if s.is_closed() => format_minutes(u64::from(m)),
                        _ => "(open)".to_string(),
                    };
                    println!(
                        "{}  {}  {:<14} {:>8}  {}",
                        s.id,
                        started.format("%Y-%m-%d %H:%M"),
                        subject,
                        duration,
                        s.notes.as_deref().unwrap_or("")
                    );
                }
                Ok(())
            }

            Command::Delete { id } => {
                self.tracker.delete_session(&id)?;
                println!("Deleted {}", id);
                Ok(())
            }

            Command::Stats { json } => {
                let stats = self.tracker.dashboard(&now)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_stats(&stats);
                }
                Ok(())
            }

            Command::Goals(cmd) => self.run_goals(cmd, &now),

            Command::Subjects(SubjectCommand::List) => {
                for subject in self.tracker.subjects()?.iter() {
                    let kind = if subject.is_preset { "preset" } else { "custom" };
                    println!("{:<12} {} {:<20} {}", subject.id, subject.color, subject.name, kind);
                }
                Ok(())
            }

            Command::Subjects(SubjectCommand::Add { id, name, color }) => {
                parse_hex_color(&color).map_err(anyhow::Error::msg)?;
                self.tracker.add_subject(Subject {
                    id: id.clone(),
                    name,
                    color,
                    is_preset: false,
                })?;
                println!("Added subject {}", id);
                Ok(())
            }

            Command::Profile {
                grade,
                target_school,
            } => {
                let mut profile = self.tracker.profile_or(&self.settings.profile)?;
                if grade.is_some() || target_school.is_some() {
                    profile.grade = grade.or(profile.grade);
                    profile.target_school = target_school.or(profile.target_school);
                    self.tracker.save_profile(&profile)?;
                }
                println!("Grade: {}", profile.grade.as_deref().unwrap_or("-"));
                println!(
                    "Target school: {}",
                    profile.target_school.as_deref().unwrap_or("-")
                );
                Ok(())
            }

            Command::Advise { json } => {
                let profile = self.tracker.profile_or(&self.settings.profile)?;
                let request = self.tracker.advice_request(&now, &profile)?;

                let advice = match OpenAiAdviceGenerator::from_settings(&self.settings.advice) {
                    Ok(generator) => request_advice(&generator, &request)
                        .await
                        .context("Advice request failed")?,
                    Err(AdviceError::MissingApiKey(var)) => {
                        warn!(env = %var, "No advice API key, using the offline plan");
                        fallback_advice(&request.study_pattern)
                    }
                    Err(e) => return Err(e.into()),
                };

                if json {
                    println!("{}", serde_json::to_string_pretty(&advice)?);
                } else {
                    print_advice(&advice);
                }
                Ok(())
            }
        }
    }

    async fn run_timer<Tz: TimeZone>(
        &mut self,
        subject: Option<SubjectId>,
        notes: Option<String>,
        tz: &Tz,
    ) -> Result<()> {
        self.tracker
            .start(subject, now_utc(), MonotonicInstant::now())?;

        let mut sigusr1 =
            signal(SignalKind::user_defined1()).context("Failed to create SIGUSR1 handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;

        let ticker = spawn_ticker(
            self.tracker.stopwatch(),
            self.settings.timer.tick_interval,
            |seconds| {
                print!("\r{}", format_hms(seconds));
                let _ = std::io::stdout().flush();
            },
        );

        info!(pid = std::process::id(), "Timer running");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    debug!("Received Ctrl-C, stopping timer");
                    break;
                }
                _ = sigterm.recv() => {
                    debug!("Received SIGTERM, stopping timer");
                    break;
                }
                _ = sigusr1.recv() => {
                    let now_mono = MonotonicInstant::now();
                    let event = if self.tracker.is_running() {
                        self.tracker.pause(now_mono)?
                    } else {
                        self.tracker.resume(now_mono)?
                    };
                    if let CoreEvent::SessionPaused { elapsed, .. } = event {
                        print!("\r{} [paused]", format_hms(elapsed.as_secs()));
                        let _ = std::io::stdout().flush();
                    }
                }
            }
        }

        ticker.cancel();
        println!();

        let events = self
            .tracker
            .stop(notes, now_utc(), MonotonicInstant::now())
            .context("Failed to record session")?;

        for event in events {
            if let CoreEvent::SessionClosed {
                duration_minutes, ..
            } = event
            {
                println!("Recorded {}", format_minutes(u64::from(duration_minutes)));
            }
        }

        self.announce_goals(&now_utc().with_timezone(tz))
    }

    fn run_goals<Tz: TimeZone>(&mut self, cmd: GoalCommand, now: &DateTime<Tz>) -> Result<()> {
        match cmd {
            GoalCommand::List => {
                let (progress, _) = self.tracker.goal_progress(now)?;
                if progress.is_empty() {
                    println!("No active goals");
                }
                for p in &progress {
                    print_goal(p);
                }
                let earned = achievements(&progress);
                if earned.first_goal {
                    println!("Achievement: first goal completed");
                }
                if earned.perfect_day {
                    println!("Achievement: perfect day, every daily goal done");
                }
            }
            GoalCommand::Add {
                goal_type,
                minutes,
                subject,
            } => {
                let goal = self.tracker.create_goal(goal_type, minutes, subject)?;
                println!("Added {} goal {}", goal.goal_type, goal.id);
            }
            GoalCommand::Set {
                id,
                minutes,
                active,
                inactive,
            } => {
                let Some(mut goal) = self.tracker.goals()?.into_iter().find(|g| g.id == id) else {
                    bail!("Goal not found: {}", id);
                };
                if let Some(minutes) = minutes {
                    goal.target_minutes = minutes;
                }
                if active {
                    goal.is_active = true;
                } else if inactive {
                    goal.is_active = false;
                }
                self.tracker.update_goal(&goal)?;
                println!("Updated goal {}", id);
            }
            GoalCommand::Remove { id } => {
                self.tracker.delete_goal(&id)?;
                println!("Removed goal {}", id);
            }
        }
        Ok(())
    }

    fn announce_goals<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<()> {
        let (_, events) = self.tracker.goal_progress(now)?;
        for event in events {
            if let CoreEvent::GoalCompleted {
                goal_type,
                achieved_minutes,
                ..
            } = event
            {
                println!(
                    "{} goal reached: {}",
                    goal_type.period_label(),
                    format_minutes(achieved_minutes)
                );
            }
        }
        Ok(())
    }
}

fn to_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{} {} is not a single local time", date, time))
}

fn print_stats(stats: &DerivedStats) {
    println!("Today:  {} ({} sessions)", format_minutes(stats.today_minutes), stats.today_sessions);
    println!("Week:   {}", format_minutes(stats.week_minutes));
    println!("Month:  {}", format_minutes(stats.month_minutes));
    println!("Total:  {} (~{}h)", format_minutes(stats.total_minutes), stats.total_hours);
    println!("Streak: {} days", stats.streak);
    println!("Average per study day: {}", format_minutes(stats.average_minutes_per_day));
    if let Some(weekday) = stats.most_productive_weekday {
        println!("Most productive day: {}", weekday);
    }

    if !stats.subject_ranking.is_empty() {
        println!();
        println!("Subjects:");
        for rank in &stats.subject_ranking {
            println!(
                "  {}. {:<16} {:>8} {:>3}%",
                rank.rank,
                rank.subject_name,
                format_minutes(rank.total_minutes),
                rank.percentage
            );
        }
    }

    println!();
    println!("Last 7 days:");
    for day in &stats.daily {
        println!(
            "  {}  {:>8}  {}",
            day.date.format("%a %m-%d"),
            format_minutes(day.minutes),
            "#".repeat((day.minutes / 15) as usize)
        );
    }
}

fn print_goal(p: &GoalProgress) {
    let scope = p.subject_name.as_deref().unwrap_or("all subjects");
    let mark = if p.is_completed { "done" } else { "" };
    println!(
        "{}  {:<8} {:<14} {:>8} / {:<8} {:>3}% {}",
        p.goal_id,
        p.goal_type,
        scope,
        format_minutes(p.achieved_minutes),
        format_minutes(u64::from(p.target_minutes)),
        p.percentage,
        mark
    );
}

fn print_advice(advice: &AdviceResponse) {
    println!("Today's plan:");
    for item in &advice.todays_plan {
        println!("  - {} for {} min: {}", item.subject, item.duration, item.reason);
    }
    println!();
    println!("Weekly goal: {}", advice.weekly_goal_progress.message);
    println!();
    println!("Tips:");
    for tip in &advice.efficiency_tips {
        println!("  - {}", tip);
    }
    println!();
    println!("{}", advice.motivational_message);
    println!(
        "Recommended pace: {} min/day",
        advice.long_term_prediction.recommended_pace
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "studylog starting");

    let mut app = App::open(&cli)?;
    let command = cli.command;

    match app.settings.service.timezone {
        TimezonePolicy::Local => app.run(command, now_utc().with_timezone(&Local)).await,
        TimezonePolicy::Named(tz) => app.run(command, now_utc().with_timezone(&tz)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(parse_clock("9.30").is_err());
    }

    #[test]
    fn test_to_utc_uses_zone() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let utc = to_utc(&chrono_tz::Asia::Tokyo, date, time).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_cli_parses_goal_add() {
        let cli = Cli::try_parse_from([
            "studylog", "goals", "add", "--type", "weekly", "--minutes", "300",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Goals(GoalCommand::Add {
                goal_type: GoalType::Weekly,
                minutes: 300,
                subject: None
            })
        ));
    }

    #[test]
    fn test_cli_rejects_bad_time() {
        let result = Cli::try_parse_from([
            "studylog", "log", "--date", "2025-06-01", "--start", "9am", "--end", "10:00",
        ]);
        assert!(result.is_err());
    }
}
