//! Admission Sim - request admission control simulator
//!
//! This crate decides, request by request, whether synthetic traffic is
//! admitted under a token bucket, sliding window or fixed window discipline,
//! and keeps rolling analytics over the outcomes. The [`engine::Engine`]
//! owns all state and runs the refill scheduler, traffic driver and
//! analytics sampler as cancellable Tokio tasks.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ratelimit;

pub use crate::config::AppConfig;
pub use crate::engine::{Engine, EngineSnapshot};
pub use crate::error::{Result, SimulatorError};
