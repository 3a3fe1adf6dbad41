//! Sliding window discipline.
//!
//! Counts logged events inside the trailing `window_size_ms` interval.
//! Old entries are never removed here; they simply fall out of the count.

use tracing::trace;

use super::algorithm::{Decision, Discipline};
use super::state::RateLimiterState;
use crate::clock::Timestamp;
use crate::config::RateLimiterConfig;
use crate::events::EventLog;

/// Sliding window admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindow;

impl Discipline for SlidingWindow {
    fn decide(
        &self,
        state: &RateLimiterState,
        config: &RateLimiterConfig,
        log: &EventLog,
        now: Timestamp,
    ) -> Decision {
        let window_start = now - config.window_size_ms as Timestamp;
        let in_window = log.count_after(window_start);
        let allowed = in_window < config.requests_per_second as usize;

        let mut next_state = state.clone();
        next_state.set_window_start(window_start);
        next_state.record_decision(allowed);

        trace!(
            allowed,
            in_window,
            limit = config.requests_per_second,
            window_start,
            "Sliding window decision"
        );

        Decision {
            allowed,
            next_state,
        }
    }
}
