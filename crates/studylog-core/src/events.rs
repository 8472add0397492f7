//! Core events emitted by the tracker

use chrono::{DateTime, Utc};
use studylog_api::GoalType;
use studylog_util::{GoalId, SessionId, SubjectId};
use std::time::Duration;

/// Events emitted by the study tracker
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Timer started and an open session was recorded
    SessionStarted {
        session_id: SessionId,
        subject_id: Option<SubjectId>,
        started_at: DateTime<Utc>,
    },

    SessionPaused {
        session_id: SessionId,
        elapsed: Duration,
    },

    SessionResumed {
        session_id: SessionId,
        elapsed: Duration,
    },

    /// Timer stopped and the session was closed
    SessionClosed {
        session_id: SessionId,
        duration_minutes: u32,
        ended_at: DateTime<Utc>,
    },

    /// Closed history changed; derived views should be recomputed
    SnapshotChanged,

    /// A goal reached its target for the first time today
    GoalCompleted {
        goal_id: GoalId,
        goal_type: GoalType,
        achieved_minutes: u64,
        target_minutes: u32,
    },
}
