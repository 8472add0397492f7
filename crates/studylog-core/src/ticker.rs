//! Periodic display refresh for a running stopwatch

use studylog_util::MonotonicInstant;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::Stopwatch;

/// Stopwatch shared between the tracker and its ticker
pub type SharedStopwatch = Arc<Mutex<Stopwatch>>;

/// Lock a shared stopwatch, recovering the value if a holder panicked
pub fn lock_stopwatch(stopwatch: &SharedStopwatch) -> MutexGuard<'_, Stopwatch> {
    stopwatch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running ticker task. Dropping it cancels the task.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that ticks `stopwatch` every `period` and calls `on_change`
/// whenever the displayed whole-second value changes.
///
/// Must be called from within a tokio runtime.
pub fn spawn_ticker<F>(stopwatch: SharedStopwatch, period: Duration, mut on_change: F) -> TickerHandle
where
    F: FnMut(u64) + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // Late ticks are dropped; the next one recomputes from the clock anyway
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_shown: Option<u64> = None;
        loop {
            interval.tick().await;

            let seconds = lock_stopwatch(&stopwatch).tick(MonotonicInstant::now());
            if last_shown != Some(seconds) {
                last_shown = Some(seconds);
                on_change(seconds);
            }
        }
    });

    debug!(period_ms = period.as_millis() as u64, "Ticker started");
    TickerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticker_reports_changes_only() {
        let stopwatch: SharedStopwatch = Arc::new(Mutex::new(Stopwatch::new()));
        lock_stopwatch(&stopwatch).start(MonotonicInstant::now());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = spawn_ticker(stopwatch.clone(), Duration::from_millis(10), move |s| {
            sink.lock().unwrap().push(s);
        });

        tokio::time::sleep(Duration::from_millis(1150)).await;
        handle.cancel();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert!(seen.contains(&1));
        // Many ticks fired but each value is reported once
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(seen, deduped);
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let stopwatch: SharedStopwatch = Arc::new(Mutex::new(Stopwatch::new()));
        let handle = spawn_ticker(stopwatch, Duration::from_millis(10), |_| {});

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
