//! Shared utilities for studylog
//!
//! This crate provides:
//! - ID types (SessionId, SubjectId, GoalId, UserId)
//! - Time utilities (mock time, monotonic time, calendar periods, HH:MM:SS)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
