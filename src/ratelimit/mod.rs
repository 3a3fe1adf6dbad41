//! Admission decision logic for the three rate limiting disciplines.
//!
//! Every decision is a pure function of the current state, the active
//! configuration, the event log and the current time. Applying the
//! returned state is the caller's job.

mod algorithm;
mod fixed_window;
mod sliding_window;
mod state;
mod token_bucket;

pub use algorithm::{Algorithm, Decision, Discipline};
pub use fixed_window::FixedWindow;
pub use sliding_window::SlidingWindow;
pub use state::RateLimiterState;
pub use token_bucket::TokenBucket;
