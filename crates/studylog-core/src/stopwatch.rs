//! Drift-free study stopwatch
//!
//! Elapsed time is always derived from monotonic clock deltas. Ticks only
//! refresh the cached display value, so skipped or delayed ticks never lose
//! time.

use studylog_api::minutes_for_elapsed;
use studylog_util::{format_hms, MonotonicInstant};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle {
        accumulated: Duration,
    },
    /// Running since `since`, with `carried` already accumulated before it.
    /// Equivalent to a virtual start instant of `since - carried`.
    Running {
        since: MonotonicInstant,
        carried: Duration,
    },
}

/// Start / pause / reset stopwatch driven by caller-supplied clock readings
#[derive(Debug, Clone)]
pub struct Stopwatch {
    state: State,
    /// Whole seconds as of the last tick
    displayed_seconds: u64,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::with_elapsed(Duration::ZERO)
    }

    /// An idle stopwatch that resumes from `elapsed`
    pub fn with_elapsed(elapsed: Duration) -> Self {
        Self {
            state: State::Idle {
                accumulated: elapsed,
            },
            displayed_seconds: elapsed.as_secs(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Idle -> Running. No-op if already running.
    pub fn start(&mut self, now: MonotonicInstant) {
        if let State::Idle { accumulated } = self.state {
            self.state = State::Running {
                since: now,
                carried: accumulated,
            };
        }
    }

    /// Running -> Idle, freezing the accumulated time. No-op if idle.
    pub fn pause(&mut self, now: MonotonicInstant) {
        if self.is_running() {
            let accumulated = self.elapsed(now);
            self.state = State::Idle { accumulated };
            self.displayed_seconds = accumulated.as_secs();
        }
    }

    /// Back to idle at zero, from any state
    pub fn reset(&mut self) {
        self.state = State::Idle {
            accumulated: Duration::ZERO,
        };
        self.displayed_seconds = 0;
    }

    /// Refresh the display value and return it
    pub fn tick(&mut self, now: MonotonicInstant) -> u64 {
        if self.is_running() {
            self.displayed_seconds = self.elapsed_seconds(now);
        }
        self.displayed_seconds
    }

    /// Value shown as of the last tick, start, or pause
    pub fn displayed_seconds(&self) -> u64 {
        self.displayed_seconds
    }

    pub fn elapsed(&self, now: MonotonicInstant) -> Duration {
        match self.state {
            State::Idle { accumulated } => accumulated,
            State::Running { since, carried } => carried + now.saturating_duration_since(since),
        }
    }

    /// Whole elapsed seconds (floor)
    pub fn elapsed_seconds(&self, now: MonotonicInstant) -> u64 {
        self.elapsed(now).as_secs()
    }

    /// Elapsed time as `HH:MM:SS`
    pub fn formatted(&self, now: MonotonicInstant) -> String {
        format_hms(self.elapsed_seconds(now))
    }

    /// Minutes a session stopped now would record (rounded up)
    pub fn recorded_minutes(&self, now: MonotonicInstant) -> u32 {
        minutes_for_elapsed(Duration::from_secs(self.elapsed_seconds(now)))
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
