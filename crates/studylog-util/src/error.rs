//! Error types for studylog

use thiserror::Error;

use crate::{GoalId, SessionId};

/// Core error type for studylog operations
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Goal not found: {0}")]
    GoalNotFound(GoalId),

    #[error("No active session")]
    NoActiveSession,

    #[error("Session already active")]
    SessionAlreadyActive,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Advice error: {0}")]
    AdviceError(String),
}

impl StudyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn advice(msg: impl Into<String>) -> Self {
        Self::AdviceError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;
