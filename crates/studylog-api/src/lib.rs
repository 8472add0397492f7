//! Boundary types for studylog
//!
//! This crate defines the closed set of typed records exchanged between the
//! persistence layer, the core computations and the presentation layer:
//! - Records (sessions, subjects, goals, profile)
//! - Derived statistics and goal progress
//! - Advice request and response payloads
//!
//! Everything serializes as camelCase JSON.

mod advice;
mod stats;
mod types;

pub use advice::*;
pub use stats::*;
pub use types::*;
