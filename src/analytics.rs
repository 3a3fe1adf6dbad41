//! Rolling analytics derived from the event log.
//!
//! Snapshots are recomputed from the log on every sample rather than kept
//! as running counters; the log is bounded so this stays cheap.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::events::EventLog;

/// Point-in-time summary of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub blocked_requests: u64,
    /// Requests per second over the trailing rate window
    pub current_rps: f64,
    /// Requests per second since the oldest retained event
    pub average_rps: f64,
    /// Percentage of admitted requests, 100 when nothing was logged
    pub success_rate: f64,
}

impl Analytics {
    /// Summarize `log` as seen at `now`.
    ///
    /// `current_window_ms` is the trailing window used for `current_rps`.
    /// `average_rps` is measured from the oldest event still retained, so
    /// its denominator restarts once the log starts evicting.
    pub fn compute(log: &EventLog, now: Timestamp, current_window_ms: u64) -> Self {
        let total = log.len() as u64;
        let allowed = log.allowed_count() as u64;
        let window_ms = current_window_ms.max(1) as Timestamp;

        let recent = log.iter().filter(|e| now - e.timestamp < window_ms).count();
        let current_rps = recent as f64 / (window_ms as f64 / 1000.0);

        let average_rps = match log.earliest() {
            Some(first) => {
                let elapsed_secs = (now - first.timestamp) as f64 / 1000.0;
                total as f64 / elapsed_secs.max(1.0)
            }
            None => 0.0,
        };

        let success_rate = if total > 0 {
            allowed as f64 / total as f64 * 100.0
        } else {
            100.0
        };

        Self {
            total_requests: total,
            allowed_requests: allowed,
            blocked_requests: total - allowed,
            current_rps,
            average_rps,
            success_rate,
        }
    }
}

/// Bounded, oldest-first sequence of past snapshots.
#[derive(Debug, Clone)]
pub struct AnalyticsHistory {
    samples: VecDeque<Analytics>,
    capacity: usize,
}

impl AnalyticsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, dropping the oldest when full.
    pub fn push(&mut self, sample: Analytics) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn to_vec(&self) -> Vec<Analytics> {
        self.samples.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RequestEvent;

    const WINDOW: u64 = 5000;

    fn log_of(events: &[(Timestamp, bool)]) -> EventLog {
        let mut log = EventLog::new(100);
        for (i, (ts, allowed)) in events.iter().enumerate() {
            log.push(RequestEvent::new(format!("req-{}", i), *ts, *allowed, "client-1"));
        }
        log
    }

    #[test]
    fn test_empty_log() {
        let analytics = Analytics::compute(&EventLog::new(100), 10_000, WINDOW);
        assert_eq!(analytics.total_requests, 0);
        assert_eq!(analytics.allowed_requests, 0);
        assert_eq!(analytics.blocked_requests, 0);
        assert_eq!(analytics.current_rps, 0.0);
        assert_eq!(analytics.average_rps, 0.0);
        assert_eq!(analytics.success_rate, 100.0);
    }

    #[test]
    fn test_success_rate() {
        let events: Vec<_> = (0..10).map(|i| (i * 100, i < 7)).collect();
        let analytics = Analytics::compute(&log_of(&events), 1_000, WINDOW);

        assert_eq!(analytics.total_requests, 10);
        assert_eq!(analytics.allowed_requests, 7);
        assert_eq!(analytics.blocked_requests, 3);
        assert!((analytics.success_rate - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_current_rps_uses_trailing_window() {
        // Two events older than 5s, five within it.
        let events = [
            (1_000, true),
            (2_000, true),
            (6_000, true),
            (7_000, true),
            (8_000, true),
            (9_000, false),
            (10_000, false),
        ];
        let analytics = Analytics::compute(&log_of(&events), 10_500, WINDOW);
        assert!((analytics.current_rps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_current_rps_excludes_window_edge() {
        let analytics = Analytics::compute(&log_of(&[(5_000, true)]), 10_000, WINDOW);
        assert_eq!(analytics.current_rps, 0.0);
    }

    #[test]
    fn test_average_rps() {
        let events: Vec<_> = (0..20).map(|i| (i * 500, true)).collect();
        // Oldest at t=0, now at t=10s.
        let analytics = Analytics::compute(&log_of(&events), 10_000, WINDOW);
        assert!((analytics.average_rps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_rps_denominator_floor() {
        let events = [(0, true), (100, true), (200, true)];
        let analytics = Analytics::compute(&log_of(&events), 300, WINDOW);
        assert!((analytics.average_rps - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_rps_follows_oldest_retained_event() {
        let mut log = EventLog::new(4);
        for i in 0..8 {
            log.push(RequestEvent::new(format!("req-{}", i), i * 1_000, true, "client-1"));
        }
        // Oldest retained is t=4000, so 4 events over 4s.
        let analytics = Analytics::compute(&log, 8_000, WINDOW);
        assert!((analytics.average_rps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = AnalyticsHistory::new(3);
        for i in 0..5 {
            let mut sample = Analytics::compute(&EventLog::new(1), 0, WINDOW);
            sample.total_requests = i;
            history.push(sample);
        }

        assert_eq!(history.len(), 3);
        let totals: Vec<_> = history.to_vec().iter().map(|a| a.total_requests).collect();
        assert_eq!(totals, vec![2, 3, 4]);

        history.clear();
        assert!(history.is_empty());
    }
}
