//! Millisecond clocks used to timestamp decisions.
//!
//! Timestamps are milliseconds since the Unix epoch so that fixed windows
//! align to epoch multiples of the window size.

use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Source of the current time for the engine.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> Timestamp;
}

/// Wall clock anchored once at creation and advanced by the Tokio timer.
///
/// Using the runtime's monotonic instant keeps timestamps consistent with
/// the scheduled tasks, including when the runtime clock is paused in tests.
#[derive(Debug)]
pub struct RuntimeClock {
    anchor_ms: Timestamp,
    anchor: tokio::time::Instant,
}

impl RuntimeClock {
    /// Create a clock anchored at the current wall-clock time.
    pub fn new() -> Self {
        Self {
            anchor_ms: chrono::Utc::now().timestamp_millis(),
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> Timestamp {
        let elapsed = tokio::time::Instant::now().duration_since(self.anchor);
        self.anchor_ms + elapsed.as_millis() as Timestamp
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at `start_ms`.
    pub fn new(start_ms: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: Timestamp) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms` milliseconds.
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);

        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_clock_follows_paused_time() {
        let clock = RuntimeClock::new();
        let start = clock.now_ms();

        tokio::time::advance(Duration::from_millis(1_500)).await;

        assert_eq!(clock.now_ms() - start, 1_500);
    }
}
