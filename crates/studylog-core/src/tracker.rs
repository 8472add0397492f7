//! Study tracker: the timer, the active session and the store together

use chrono::{DateTime, TimeZone, Utc};
use studylog_api::{
    AdviceRequest, DerivedStats, Goal, GoalProgress, GoalType, Profile, StudySession, Subject,
    SubjectCatalog,
};
use studylog_store::{Store, StoreError};
use studylog_util::{GoalId, MonotonicInstant, Result, SessionId, StudyError, SubjectId, UserId};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    aggregate, build_advice_request, goal_progress, lock_stopwatch, CoreEvent,
    GoalCompletionNotices, SharedStopwatch, Stopwatch,
};

/// A complete, already-fetched view of one user's records
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sessions: Vec<StudySession>,
    pub goals: Vec<Goal>,
    pub subjects: SubjectCatalog,
}

/// Orchestrates one user's timer and records.
///
/// The stopwatch and the open session change together: the stopwatch only
/// starts after the open session is stored, and the session is only cleared
/// after the store has closed it.
pub struct StudyTracker {
    store: Arc<dyn Store>,
    user_id: UserId,
    stopwatch: SharedStopwatch,
    active: Option<StudySession>,
    notices: GoalCompletionNotices,
}

impl StudyTracker {
    pub fn new(store: Arc<dyn Store>, user_id: UserId) -> Self {
        info!(user_id = %user_id, "Study tracker initialized");
        Self {
            store,
            user_id,
            stopwatch: Arc::new(Mutex::new(Stopwatch::new())),
            active: None,
            notices: GoalCompletionNotices::new(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Shared handle to the stopwatch, for driving a ticker
    pub fn stopwatch(&self) -> SharedStopwatch {
        self.stopwatch.clone()
    }

    pub fn active_session(&self) -> Option<&StudySession> {
        self.active.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some() && lock_stopwatch(&self.stopwatch).is_running()
    }

    /// Store the preset catalog. Returns the number of subjects written.
    pub fn seed_subjects(&self, presets: &[Subject]) -> Result<usize> {
        let mut seeded = 0;
        for subject in presets {
            let preset = Subject {
                is_preset: true,
                ..subject.clone()
            };
            match self.store.upsert_subject(&self.user_id, &preset) {
                Ok(()) => seeded += 1,
                Err(StoreError::Conflict(_)) => {
                    warn!(subject_id = %preset.id, "Preset id already used by a custom subject, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!(count = seeded, "Preset subjects seeded");
        Ok(seeded)
    }

    // Timer

    pub fn start(
        &mut self,
        subject_id: Option<SubjectId>,
        now: DateTime<Utc>,
        now_mono: MonotonicInstant,
    ) -> Result<CoreEvent> {
        if self.active.is_some() {
            return Err(StudyError::SessionAlreadyActive);
        }

        let session = StudySession::open(self.user_id.clone(), subject_id, now);
        self.store.insert_session(&session)?;

        {
            let mut stopwatch = lock_stopwatch(&self.stopwatch);
            stopwatch.reset();
            stopwatch.start(now_mono);
        }

        info!(
            session_id = %session.id,
            subject_id = ?session.subject_id.as_ref().map(|s| s.as_str()),
            "Session started"
        );

        let event = CoreEvent::SessionStarted {
            session_id: session.id.clone(),
            subject_id: session.subject_id.clone(),
            started_at: session.started_at,
        };
        self.active = Some(session);
        Ok(event)
    }

    pub fn pause(&mut self, now_mono: MonotonicInstant) -> Result<CoreEvent> {
        let session_id = self.active_id()?;
        let mut stopwatch = lock_stopwatch(&self.stopwatch);
        stopwatch.pause(now_mono);
        let elapsed = stopwatch.elapsed(now_mono);

        info!(session_id = %session_id, elapsed_secs = elapsed.as_secs(), "Session paused");
        Ok(CoreEvent::SessionPaused { session_id, elapsed })
    }

    pub fn resume(&mut self, now_mono: MonotonicInstant) -> Result<CoreEvent> {
        let session_id = self.active_id()?;
        let mut stopwatch = lock_stopwatch(&self.stopwatch);
        stopwatch.start(now_mono);
        let elapsed = stopwatch.elapsed(now_mono);

        info!(session_id = %session_id, elapsed_secs = elapsed.as_secs(), "Session resumed");
        Ok(CoreEvent::SessionResumed { session_id, elapsed })
    }

    /// Stop the timer and close the active session.
    ///
    /// On a store failure the session stays active and the stopwatch keeps
    /// its value, so the stop can be retried.
    pub fn stop(
        &mut self,
        notes: Option<String>,
        now: DateTime<Utc>,
        now_mono: MonotonicInstant,
    ) -> Result<Vec<CoreEvent>> {
        let session_id = self.active_id()?;
        let duration_minutes = lock_stopwatch(&self.stopwatch).recorded_minutes(now_mono);

        if let Err(e) =
            self.store
                .close_session(&session_id, now, duration_minutes, notes.as_deref())
        {
            warn!(session_id = %session_id, error = %e, "Failed to close session");
            return Err(e.into());
        }

        lock_stopwatch(&self.stopwatch).reset();
        self.active = None;

        info!(session_id = %session_id, duration_minutes, "Session closed");

        Ok(vec![
            CoreEvent::SessionClosed {
                session_id,
                duration_minutes,
                ended_at: now,
            },
            CoreEvent::SnapshotChanged,
        ])
    }

    /// Refresh the stopwatch display. Returns the displayed seconds.
    pub fn tick(&self, now_mono: MonotonicInstant) -> u64 {
        lock_stopwatch(&self.stopwatch).tick(now_mono)
    }

    fn active_id(&self) -> Result<SessionId> {
        self.active
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(StudyError::NoActiveSession)
    }

    // Closed records

    /// Record a session entered by hand
    pub fn record_manual(
        &self,
        subject_id: Option<SubjectId>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<(StudySession, CoreEvent)> {
        if ended_at <= started_at {
            return Err(StudyError::validation("Session must end after it starts"));
        }

        let session =
            StudySession::closed(self.user_id.clone(), subject_id, started_at, ended_at, notes);
        self.store.insert_session(&session)?;

        info!(
            session_id = %session.id,
            duration_minutes = session.minutes(),
            "Manual session recorded"
        );
        Ok((session, CoreEvent::SnapshotChanged))
    }

    /// Replace a closed session record
    pub fn edit_session(&self, session: &StudySession) -> Result<CoreEvent> {
        if !session.is_closed() {
            return Err(StudyError::validation("Only closed sessions can be edited"));
        }
        self.owned_session(&session.id)?;

        self.store.update_session(session)?;
        info!(session_id = %session.id, "Session edited");
        Ok(CoreEvent::SnapshotChanged)
    }

    pub fn delete_session(&self, id: &SessionId) -> Result<CoreEvent> {
        if self.active.as_ref().is_some_and(|s| &s.id == id) {
            return Err(StudyError::validation("Stop the running session before deleting it"));
        }
        self.owned_session(id)?;

        if !self.store.delete_session(id)? {
            return Err(StudyError::SessionNotFound(id.clone()));
        }
        info!(session_id = %id, "Session deleted");
        Ok(CoreEvent::SnapshotChanged)
    }

    fn owned_session(&self, id: &SessionId) -> Result<StudySession> {
        self.store
            .get_session(id)?
            .filter(|s| s.user_id == self.user_id)
            .ok_or_else(|| StudyError::SessionNotFound(id.clone()))
    }

    /// Sessions newest first, open ones included
    pub fn sessions(&self, limit: Option<usize>) -> Result<Vec<StudySession>> {
        let mut sessions = self.store.list_sessions(&self.user_id, None)?;
        if let Some(limit) = limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    /// Open sessions in the store other than the one this tracker runs.
    /// They are reported, never closed or counted.
    pub fn stale_open_sessions(&self) -> Result<Vec<StudySession>> {
        let active_id = self.active.as_ref().map(|s| &s.id);
        Ok(self
            .store
            .list_sessions(&self.user_id, None)?
            .into_iter()
            .filter(|s| !s.is_closed() && Some(&s.id) != active_id)
            .collect())
    }

    // Goals and subjects

    pub fn create_goal(
        &self,
        goal_type: GoalType,
        target_minutes: u32,
        subject_id: Option<SubjectId>,
    ) -> Result<Goal> {
        if target_minutes == 0 {
            return Err(StudyError::validation("Goal target must be positive"));
        }

        let goal = Goal::new(self.user_id.clone(), goal_type, target_minutes, subject_id);
        self.store.insert_goal(&goal)?;
        info!(goal_id = %goal.id, goal_type = %goal.goal_type, target_minutes, "Goal created");
        Ok(goal)
    }

    pub fn update_goal(&self, goal: &Goal) -> Result<()> {
        if goal.target_minutes == 0 {
            return Err(StudyError::validation("Goal target must be positive"));
        }
        let existing = self
            .store
            .get_goal(&goal.id)?
            .filter(|g| g.user_id == self.user_id);
        if existing.is_none() {
            return Err(StudyError::GoalNotFound(goal.id.clone()));
        }

        self.store.update_goal(goal)?;
        info!(goal_id = %goal.id, "Goal updated");
        Ok(())
    }

    pub fn delete_goal(&self, id: &GoalId) -> Result<()> {
        let owned = self
            .store
            .get_goal(id)?
            .is_some_and(|g| g.user_id == self.user_id);
        if !owned || !self.store.delete_goal(id)? {
            return Err(StudyError::GoalNotFound(id.clone()));
        }
        info!(goal_id = %id, "Goal deleted");
        Ok(())
    }

    pub fn goals(&self) -> Result<Vec<Goal>> {
        Ok(self.store.list_goals(&self.user_id)?)
    }

    /// Add a user-defined subject
    pub fn add_subject(&self, subject: Subject) -> Result<()> {
        if subject.name.trim().is_empty() {
            return Err(StudyError::validation("Subject name must not be empty"));
        }
        let subject = Subject {
            is_preset: false,
            ..subject
        };
        match self.store.upsert_subject(&self.user_id, &subject) {
            Err(StoreError::Conflict(_)) => {
                return Err(StudyError::validation(format!(
                    "Subject id '{}' is already taken",
                    subject.id
                )));
            }
            other => other?,
        }
        info!(subject_id = %subject.id, "Subject added");
        Ok(())
    }

    pub fn subjects(&self) -> Result<SubjectCatalog> {
        Ok(SubjectCatalog::new(self.store.list_subjects(&self.user_id)?))
    }

    // Derived views

    /// Fetch everything the pure computations need. Any store failure
    /// fails the whole snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let sessions = self.store.list_sessions(&self.user_id, None)?;
        let goals = self.store.list_active_goals(&self.user_id)?;
        let subjects = self.subjects()?;
        debug!(
            sessions = sessions.len(),
            goals = goals.len(),
            subjects = subjects.len(),
            "Snapshot fetched"
        );
        Ok(Snapshot {
            sessions,
            goals,
            subjects,
        })
    }

    pub fn dashboard<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DerivedStats> {
        let snapshot = self.snapshot()?;
        Ok(aggregate(&snapshot.sessions, now, &snapshot.subjects))
    }

    /// Goal progress plus a `GoalCompleted` event for each goal that
    /// completed and has not been announced yet today
    pub fn goal_progress<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
    ) -> Result<(Vec<GoalProgress>, Vec<CoreEvent>)> {
        let snapshot = self.snapshot()?;
        let progress = goal_progress(&snapshot.goals, &snapshot.sessions, now, &snapshot.subjects);

        let events = self
            .notices
            .newly_completed(&progress, now.date_naive())
            .into_iter()
            .map(|p| {
                info!(goal_id = %p.goal_id, achieved = p.achieved_minutes, "Goal completed");
                CoreEvent::GoalCompleted {
                    goal_id: p.goal_id.clone(),
                    goal_type: p.goal_type,
                    achieved_minutes: p.achieved_minutes,
                    target_minutes: p.target_minutes,
                }
            })
            .collect();

        Ok((progress, events))
    }

    pub fn advice_request<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        profile: &Profile,
    ) -> Result<AdviceRequest> {
        let snapshot = self.snapshot()?;
        Ok(build_advice_request(
            &snapshot.sessions,
            &snapshot.goals,
            profile,
            now,
            &snapshot.subjects,
        ))
    }

    /// Stored profile, or `fallback` when none was saved
    pub fn profile_or(&self, fallback: &Profile) -> Result<Profile> {
        Ok(self
            .store
            .get_profile(&self.user_id)?
            .unwrap_or_else(|| fallback.clone()))
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.store.save_profile(&self.user_id, profile)?;
        info!(user_id = %self.user_id, "Profile saved");
        Ok(())
    }
}
