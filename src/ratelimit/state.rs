//! Rate limiter state shared by all disciplines.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::config::RateLimiterConfig;

/// Observable limiter state.
///
/// `tokens_remaining` always stays within `0..=max_tokens`; every mutator
/// clamps instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterState {
    tokens_remaining: f64,
    max_tokens: f64,
    refill_rate: f64,
    window_start: Timestamp,
    request_count: u64,
    is_blocked: bool,
}

impl RateLimiterState {
    /// A full bucket shaped by `config`.
    pub fn new(config: &RateLimiterConfig, now: Timestamp) -> Self {
        let capacity = config.burst_capacity as f64;
        Self {
            tokens_remaining: capacity,
            max_tokens: capacity,
            refill_rate: config.requests_per_second as f64,
            window_start: now,
            request_count: 0,
            is_blocked: false,
        }
    }

    /// Same as `new`, but starting with `tokens` (clamped to capacity).
    pub fn with_tokens(config: &RateLimiterConfig, tokens: f64, now: Timestamp) -> Self {
        let mut state = Self::new(config, now);
        state.tokens_remaining = tokens.clamp(0.0, state.max_tokens);
        state
    }

    pub fn tokens_remaining(&self) -> f64 {
        self.tokens_remaining
    }

    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn window_start(&self) -> Timestamp {
        self.window_start
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Whether the most recent decision was a denial.
    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    /// Add up to `amount` tokens, stopping at capacity.
    pub fn fill(&mut self, amount: f64) {
        self.tokens_remaining = (self.tokens_remaining + amount).min(self.max_tokens);
    }

    /// Remove up to `amount` tokens, stopping at zero.
    pub fn drain(&mut self, amount: f64) {
        self.tokens_remaining = (self.tokens_remaining - amount).max(0.0);
    }

    /// One refill tick. Returns `false` when the bucket was already full.
    pub fn refill_one(&mut self) -> bool {
        if self.tokens_remaining >= self.max_tokens {
            return false;
        }
        self.fill(1.0);
        true
    }

    /// Follow a configuration change: capacity and refill rate track the
    /// config and the token count is clamped down, never up.
    pub fn apply_config(&mut self, config: &RateLimiterConfig) {
        self.max_tokens = config.burst_capacity as f64;
        self.refill_rate = config.requests_per_second as f64;
        self.tokens_remaining = self.tokens_remaining.min(self.max_tokens);
    }

    pub(crate) fn take_token(&mut self) {
        self.tokens_remaining = (self.tokens_remaining - 1.0).max(0.0);
    }

    pub(crate) fn set_window_start(&mut self, window_start: Timestamp) {
        self.window_start = window_start;
    }

    pub(crate) fn record_decision(&mut self, allowed: bool) {
        self.request_count += 1;
        self.is_blocked = !allowed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(burst: u32) -> RateLimiterConfig {
        RateLimiterConfig {
            burst_capacity: burst,
            ..RateLimiterConfig::default()
        }
    }

    #[test]
    fn test_new_state_is_full() {
        let state = RateLimiterState::new(&config(50), 1_000);
        assert_eq!(state.tokens_remaining(), 50.0);
        assert_eq!(state.max_tokens(), 50.0);
        assert_eq!(state.refill_rate(), 10.0);
        assert_eq!(state.window_start(), 1_000);
        assert_eq!(state.request_count(), 0);
        assert!(!state.is_blocked());
    }

    #[test]
    fn test_fill_clamps_to_capacity() {
        let mut state = RateLimiterState::with_tokens(&config(20), 5.0, 0);
        state.fill(3.0);
        assert_eq!(state.tokens_remaining(), 8.0);

        state.fill(state.max_tokens() + 100.0);
        assert_eq!(state.tokens_remaining(), 20.0);
    }

    #[test]
    fn test_drain_clamps_to_zero() {
        let mut state = RateLimiterState::new(&config(20), 0);
        state.drain(7.0);
        assert_eq!(state.tokens_remaining(), 13.0);

        state.drain(state.tokens_remaining() + 100.0);
        assert_eq!(state.tokens_remaining(), 0.0);
    }

    #[test]
    fn test_manual_ops_leave_counters_alone() {
        let mut state = RateLimiterState::new(&config(5), 0);
        state.record_decision(false);
        state.fill(1.0);
        state.drain(2.0);
        assert_eq!(state.request_count(), 1);
        assert!(state.is_blocked());
    }

    #[test]
    fn test_refill_one_stops_at_capacity() {
        let mut state = RateLimiterState::with_tokens(&config(2), 1.0, 0);
        assert!(state.refill_one());
        assert_eq!(state.tokens_remaining(), 2.0);
        assert!(!state.refill_one());
        assert_eq!(state.tokens_remaining(), 2.0);
    }

    #[test]
    fn test_shrinking_capacity_clamps_tokens_down() {
        let mut state = RateLimiterState::new(&config(50), 0);
        state.apply_config(&config(10));
        assert_eq!(state.max_tokens(), 10.0);
        assert_eq!(state.tokens_remaining(), 10.0);

        // Growing capacity never adds tokens.
        state.apply_config(&config(100));
        assert_eq!(state.max_tokens(), 100.0);
        assert_eq!(state.tokens_remaining(), 10.0);
    }

    #[test]
    fn test_with_tokens_is_clamped() {
        let state = RateLimiterState::with_tokens(&config(5), 9.0, 0);
        assert_eq!(state.tokens_remaining(), 5.0);

        let state = RateLimiterState::with_tokens(&config(5), -3.0, 0);
        assert_eq!(state.tokens_remaining(), 0.0);
    }
}
