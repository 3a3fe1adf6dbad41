//! Token bucket discipline.
//!
//! Admission spends one token. Refilling happens elsewhere, on a fixed
//! cadence driven by the engine's refill scheduler.

use tracing::trace;

use super::algorithm::{Decision, Discipline};
use super::state::RateLimiterState;
use crate::clock::Timestamp;
use crate::config::RateLimiterConfig;
use crate::events::EventLog;

/// Token bucket admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBucket;

impl Discipline for TokenBucket {
    fn decide(
        &self,
        state: &RateLimiterState,
        _config: &RateLimiterConfig,
        _log: &EventLog,
        _now: Timestamp,
    ) -> Decision {
        let mut next_state = state.clone();
        let allowed = state.tokens_remaining() >= 1.0;
        if allowed {
            next_state.take_token();
        }
        next_state.record_decision(allowed);

        trace!(
            allowed,
            tokens_remaining = next_state.tokens_remaining(),
            "Token bucket decision"
        );

        Decision {
            allowed,
            next_state,
        }
    }
}
