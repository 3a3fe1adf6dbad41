//! Fixed window discipline.
//!
//! Windows are aligned to multiples of `window_size_ms` since the epoch and
//! reset sharply at each boundary, so up to twice the limit can pass across
//! a boundary.

use tracing::trace;

use super::algorithm::{Decision, Discipline};
use super::state::RateLimiterState;
use crate::clock::Timestamp;
use crate::config::RateLimiterConfig;
use crate::events::EventLog;

/// Fixed window admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindow;

impl FixedWindow {
    /// Start of the epoch-aligned window containing `now`.
    pub fn window_start(now: Timestamp, window_size_ms: u64) -> Timestamp {
        let size = window_size_ms as Timestamp;
        now.div_euclid(size) * size
    }
}

impl Discipline for FixedWindow {
    fn decide(
        &self,
        state: &RateLimiterState,
        config: &RateLimiterConfig,
        log: &EventLog,
        now: Timestamp,
    ) -> Decision {
        let window_start = Self::window_start(now, config.window_size_ms);
        let in_window = log.count_since(window_start);
        let allowed = in_window < config.requests_per_second as usize;

        let mut next_state = state.clone();
        next_state.set_window_start(window_start);
        next_state.record_decision(allowed);

        trace!(
            allowed,
            in_window,
            limit = config.requests_per_second,
            window_start,
            "Fixed window decision"
        );

        Decision {
            allowed,
            next_state,
        }
    }
}
