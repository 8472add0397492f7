//! Core timing and statistics for studylog
//!
//! This crate contains:
//! - The drift-corrected stopwatch and its display ticker
//! - Dashboard aggregation over a session snapshot
//! - Goal progress and once-per-day completion notices
//! - Advice request shaping, response parsing and the fallback plan
//! - The tracker tying the timer to the store

mod advice;
mod aggregate;
mod events;
mod goals;
mod openai;
mod stopwatch;
mod ticker;
mod tracker;

pub use advice::*;
pub use aggregate::*;
pub use events::*;
pub use goals::*;
pub use openai::*;
pub use stopwatch::*;
pub use ticker::*;
pub use tracker::*;
