//! Store trait definitions

use chrono::{DateTime, Utc};
use studylog_api::{Goal, Profile, StudySession, Subject};
use studylog_util::{GoalId, SessionId, UserId};

use crate::StoreResult;

/// Main store trait.
///
/// Every listing is scoped to one user. Records are converted to typed
/// values once, at this boundary.
pub trait Store: Send + Sync {
    // Subjects

    /// Preset subjects plus the user's own, ordered by name
    fn list_subjects(&self, user_id: &UserId) -> StoreResult<Vec<Subject>>;

    /// Insert or replace a subject. Presets are stored without an owner.
    /// Fails with `Conflict` if the id belongs to a preset or another user
    /// and `subject` is not of the same kind and owner.
    fn upsert_subject(&self, user_id: &UserId, subject: &Subject) -> StoreResult<()>;

    // Sessions

    /// Sessions started at or after `since` (all when `None`), newest first.
    /// Includes open sessions.
    fn list_sessions(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudySession>>;

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<StudySession>>;

    fn insert_session(&self, session: &StudySession) -> StoreResult<()>;

    /// Close an open session. Fails with `NotFound` if the session does not
    /// exist or is already closed.
    fn close_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        duration_minutes: u32,
        notes: Option<&str>,
    ) -> StoreResult<()>;

    /// Replace a session record
    fn update_session(&self, session: &StudySession) -> StoreResult<()>;

    /// Returns whether a row was deleted
    fn delete_session(&self, id: &SessionId) -> StoreResult<bool>;

    // Goals

    fn list_goals(&self, user_id: &UserId) -> StoreResult<Vec<Goal>>;

    fn list_active_goals(&self, user_id: &UserId) -> StoreResult<Vec<Goal>>;

    fn get_goal(&self, id: &GoalId) -> StoreResult<Option<Goal>>;

    fn insert_goal(&self, goal: &Goal) -> StoreResult<()>;

    fn update_goal(&self, goal: &Goal) -> StoreResult<()>;

    /// Returns whether a row was deleted
    fn delete_goal(&self, id: &GoalId) -> StoreResult<bool>;

    // Profile

    fn get_profile(&self, user_id: &UserId) -> StoreResult<Option<Profile>>;

    fn save_profile(&self, user_id: &UserId, profile: &Profile) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
