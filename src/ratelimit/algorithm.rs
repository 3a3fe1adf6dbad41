//! Discipline selection and dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fixed_window::FixedWindow;
use super::sliding_window::SlidingWindow;
use super::state::RateLimiterState;
use super::token_bucket::TokenBucket;
use crate::clock::Timestamp;
use crate::config::RateLimiterConfig;
use crate::error::SimulatorError;
use crate::events::EventLog;

/// The rate limiting discipline in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Tokens accrue at a fixed rate up to the burst capacity
    #[default]
    TokenBucket,
    /// Count of events in a trailing window
    SlidingWindow,
    /// Count of events in an epoch-aligned window
    FixedWindow,
}

impl Algorithm {
    /// All disciplines, in display order.
    pub const ALL: [Algorithm; 3] = [
        Algorithm::TokenBucket,
        Algorithm::SlidingWindow,
        Algorithm::FixedWindow,
    ];

    /// The configuration name of this discipline.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::TokenBucket => "token-bucket",
            Algorithm::SlidingWindow => "sliding-window",
            Algorithm::FixedWindow => "fixed-window",
        }
    }

    /// Decision logic for this discipline.
    pub fn discipline(&self) -> &'static dyn Discipline {
        match self {
            Algorithm::TokenBucket => &TokenBucket,
            Algorithm::SlidingWindow => &SlidingWindow,
            Algorithm::FixedWindow => &FixedWindow,
        }
    }

    /// Decide a single request under this discipline.
    pub fn decide(
        &self,
        state: &RateLimiterState,
        config: &RateLimiterConfig,
        log: &EventLog,
        now: Timestamp,
    ) -> Decision {
        self.discipline().decide(state, config, log, now)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                SimulatorError::Validation(format!(
                    "unknown algorithm '{}', expected one of token-bucket, sliding-window, fixed-window",
                    s
                ))
            })
    }
}

/// Outcome of one admission decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// State to install after this decision
    pub next_state: RateLimiterState,
}

/// A rate limiting discipline.
///
/// Implementations read every configuration value at call time and never
/// mutate their inputs.
pub trait Discipline: Send + Sync {
    /// Decide whether a request arriving at `now` is admitted.
    fn decide(
        &self,
        state: &RateLimiterState,
        config: &RateLimiterConfig,
        log: &EventLog,
        now: Timestamp,
    ) -> Decision;
}
