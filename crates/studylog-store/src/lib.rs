//! Persistence layer for studylog
//!
//! Provides:
//! - Study sessions (open and closed)
//! - Goals
//! - Subject catalog (presets and user-defined)
//! - Profile context for advice requests

mod sqlite;
mod traits;

pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already taken: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<StoreError> for studylog_util::StudyError {
    fn from(e: StoreError) -> Self {
        studylog_util::StudyError::store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
