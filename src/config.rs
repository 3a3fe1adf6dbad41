//! Configuration management for the simulator.
//!
//! Values are validated here, at the boundary, so the engine only ever sees
//! well-formed configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SimulatorError};
use crate::ratelimit::Algorithm;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "ADMISSION";

const MAX_REQUESTS_PER_SECOND: u32 = 1_000;
const MAX_BURST_CAPACITY: u32 = 10_000;
const MAX_WINDOW_SIZE_MS: u64 = 3_600_000;
const MIN_REQUEST_RATE: f64 = 0.01;
const MAX_REQUEST_RATE: f64 = 10_000.0;

/// Main configuration for the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: RateLimiterConfig,

    /// Synthetic traffic configuration
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Engine bookkeeping configuration
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Discipline in effect
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Window limit, and token refill rate for the token bucket
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Token bucket capacity
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,

    /// Window length for the window disciplines
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            requests_per_second: default_requests_per_second(),
            burst_capacity: default_burst_capacity(),
            window_size_ms: default_window_size_ms(),
        }
    }
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_burst_capacity() -> u32 {
    50
}

fn default_window_size_ms() -> u64 {
    1000
}

impl RateLimiterConfig {
    /// Interval between single-token refills.
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second.max(1) as f64)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_REQUESTS_PER_SECOND).contains(&self.requests_per_second) {
            return Err(SimulatorError::Validation(format!(
                "requests_per_second must be between 1 and {}, got {}",
                MAX_REQUESTS_PER_SECOND, self.requests_per_second
            )));
        }

        if !(1..=MAX_BURST_CAPACITY).contains(&self.burst_capacity) {
            return Err(SimulatorError::Validation(format!(
                "burst_capacity must be between 1 and {}, got {}",
                MAX_BURST_CAPACITY, self.burst_capacity
            )));
        }

        if !(1..=MAX_WINDOW_SIZE_MS).contains(&self.window_size_ms) {
            return Err(SimulatorError::Validation(format!(
                "window_size_ms must be between 1 and {}, got {}",
                MAX_WINDOW_SIZE_MS, self.window_size_ms
            )));
        }

        Ok(())
    }
}

/// Synthetic traffic configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Mean requests generated per second
    #[serde(default = "default_request_rate")]
    pub request_rate: f64,

    /// Jitter each inter-arrival delay by a factor in [0.5, 1.5)
    #[serde(default)]
    pub burst_pattern: bool,

    /// Number of synthetic clients requests are spread across
    #[serde(default = "default_client_count")]
    pub client_count: u32,

    /// Seconds to run before stopping on its own, 0 for no limit
    #[serde(default = "default_duration")]
    pub duration: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            request_rate: default_request_rate(),
            burst_pattern: false,
            client_count: default_client_count(),
            duration: default_duration(),
        }
    }
}

fn default_request_rate() -> f64 {
    15.0
}

fn default_client_count() -> u32 {
    1
}

fn default_duration() -> u64 {
    60
}

impl SimulationConfig {
    /// Inter-arrival delay in milliseconds before any burst jitter.
    pub fn base_interval_ms(&self) -> f64 {
        1000.0 / self.request_rate
    }

    /// How long a run lasts, if bounded.
    pub fn run_limit(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_REQUEST_RATE..=MAX_REQUEST_RATE).contains(&self.request_rate) {
            return Err(SimulatorError::Validation(format!(
                "request_rate must be between {} and {}, got {}",
                MIN_REQUEST_RATE, MAX_REQUEST_RATE, self.request_rate
            )));
        }

        if self.client_count == 0 {
            return Err(SimulatorError::Validation(
                "client_count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Engine bookkeeping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of request events retained
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Number of analytics snapshots retained
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Analytics sampling period in milliseconds
    #[serde(default = "default_analytics_interval_ms")]
    pub analytics_interval_ms: u64,

    /// Trailing window used for the current request rate
    #[serde(default = "default_current_rps_window_ms")]
    pub current_rps_window_ms: u64,

    /// Seed for the traffic generator, random when unset
    #[serde(default)]
    pub traffic_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: default_event_log_capacity(),
            history_capacity: default_history_capacity(),
            analytics_interval_ms: default_analytics_interval_ms(),
            current_rps_window_ms: default_current_rps_window_ms(),
            traffic_seed: None,
        }
    }
}

fn default_event_log_capacity() -> usize {
    100
}

fn default_history_capacity() -> usize {
    50
}

fn default_analytics_interval_ms() -> u64 {
    1000
}

fn default_current_rps_window_ms() -> u64 {
    5000
}

impl EngineConfig {
    pub fn analytics_interval(&self) -> Duration {
        Duration::from_millis(self.analytics_interval_ms)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.event_log_capacity == 0 {
            return Err(SimulatorError::Validation(
                "event_log_capacity must be at least 1".to_string(),
            ));
        }

        if self.history_capacity == 0 {
            return Err(SimulatorError::Validation(
                "history_capacity must be at least 1".to_string(),
            ));
        }

        if self.analytics_interval_ms == 0 || self.current_rps_window_ms == 0 {
            return Err(SimulatorError::Validation(
                "analytics intervals must be at least 1 ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Window disciplines count admissions from the event log, so the log
    /// must be able to hold a full window's worth of requests.
    pub fn check_limiter(&self, limiter: &RateLimiterConfig) -> Result<()> {
        if limiter.requests_per_second as usize > self.event_log_capacity {
            return Err(SimulatorError::Validation(format!(
                "requests_per_second ({}) must not exceed event_log_capacity ({})",
                limiter.requests_per_second, self.event_log_capacity
            )));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional file plus `ADMISSION_*`
    /// environment overrides (nested keys separated by `__`).
    ///
    /// The result is not validated; callers apply any remaining overrides
    /// and then call [`AppConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading simulator configuration");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| SimulatorError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.limiter.validate()?;
        self.simulation.validate()?;
        self.engine.validate()?;
        self.engine.check_limiter(&self.limiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.limiter.algorithm, Algorithm::TokenBucket);
        assert_eq!(config.limiter.requests_per_second, 10);
        assert_eq!(config.limiter.burst_capacity, 50);
        assert_eq!(config.limiter.window_size_ms, 1000);
        assert_eq!(config.simulation.request_rate, 15.0);
        assert!(!config.simulation.burst_pattern);
        assert_eq!(config.simulation.client_count, 1);
        assert_eq!(config.engine.event_log_capacity, 100);
        assert_eq!(config.engine.history_capacity, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
limiter:
  algorithm: sliding-window
  requests_per_second: 3
simulation:
  burst_pattern: true
  client_count: 4
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.algorithm, Algorithm::SlidingWindow);
        assert_eq!(config.limiter.requests_per_second, 3);
        assert_eq!(config.limiter.burst_capacity, 50);
        assert!(config.simulation.burst_pattern);
        assert_eq!(config.simulation.client_count, 4);
        assert_eq!(config.simulation.request_rate, 15.0);
    }

    #[test]
    fn test_parse_example_file() {
        let config =
            AppConfig::from_yaml(include_str!("../admission-sim.example.yaml")).unwrap();
        assert_eq!(config.limiter.algorithm, Algorithm::TokenBucket);
        assert_eq!(config.simulation.request_rate, 15.0);
        assert!(config.simulation.burst_pattern);
        assert_eq!(config.simulation.client_count, 5);
        assert_eq!(config.simulation.duration, 30);
        assert_eq!(config.engine.traffic_seed, None);
    }

    #[test]
    fn test_parse_rejects_unknown_algorithm() {
        let yaml = r#"
limiter:
  algorithm: leaky-bucket
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SimulatorError::Config(_)));
    }

    #[test]
    fn test_parse_rejects_out_of_range_values() {
        let yaml = r#"
limiter:
  burst_capacity: 0
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SimulatorError::Validation(_)));
    }

    #[test]
    fn test_limiter_validation() {
        let valid = RateLimiterConfig::default();
        assert!(valid.validate().is_ok());

        for invalid in [
            RateLimiterConfig { requests_per_second: 0, ..valid.clone() },
            RateLimiterConfig { requests_per_second: 1_001, ..valid.clone() },
            RateLimiterConfig { burst_capacity: 0, ..valid.clone() },
            RateLimiterConfig { window_size_ms: 0, ..valid.clone() },
        ] {
            assert!(invalid.validate().is_err(), "{:?} should be rejected", invalid);
        }
    }

    #[test]
    fn test_simulation_validation() {
        let valid = SimulationConfig::default();
        assert!(valid.validate().is_ok());

        for invalid in [
            SimulationConfig { request_rate: 0.0, ..valid.clone() },
            SimulationConfig { request_rate: -1.0, ..valid.clone() },
            SimulationConfig { request_rate: f64::NAN, ..valid.clone() },
            SimulationConfig { request_rate: f64::INFINITY, ..valid.clone() },
            SimulationConfig { request_rate: 1e-30, ..valid.clone() },
            SimulationConfig { request_rate: 10_001.0, ..valid.clone() },
            SimulationConfig { client_count: 0, ..valid.clone() },
        ] {
            assert!(invalid.validate().is_err(), "{:?} should be rejected", invalid);
        }
    }

    #[test]
    fn test_slowest_request_rate_accepted() {
        let slow = SimulationConfig {
            request_rate: MIN_REQUEST_RATE,
            ..SimulationConfig::default()
        };
        assert!(slow.validate().is_ok());
        assert!((slow.base_interval_ms() - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_limit_must_fit_in_event_log() {
        let mut config = AppConfig::default();
        config.limiter.requests_per_second = 100;
        assert!(config.validate().is_ok());

        config.limiter.requests_per_second = 101;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SimulatorError::Validation(_)));

        config.engine.event_log_capacity = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let path = std::env::temp_dir().join(format!(
            "admission-sim-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "limiter:\n  burst_capacity: 0\n").unwrap();

        let loaded = AppConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();

        let mut config = loaded.unwrap();
        assert_eq!(config.limiter.burst_capacity, 0);
        assert!(config.validate().is_err());

        config.limiter.burst_capacity = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refill_period() {
        let config = RateLimiterConfig {
            requests_per_second: 4,
            ..RateLimiterConfig::default()
        };
        assert_eq!(config.refill_period(), Duration::from_millis(250));
    }

    #[test]
    fn test_run_limit() {
        let mut simulation = SimulationConfig::default();
        assert_eq!(simulation.run_limit(), Some(Duration::from_secs(60)));

        simulation.duration = 0;
        assert_eq!(simulation.run_limit(), None);
    }

    #[test]
    fn test_base_interval() {
        let simulation = SimulationConfig {
            request_rate: 20.0,
            ..SimulationConfig::default()
        };
        assert!((simulation.base_interval_ms() - 50.0).abs() < 1e-9);
    }
}
