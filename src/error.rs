//! Error types for the admission simulator.

use thiserror::Error;

/// Main error type for simulator operations.
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command or configuration value was out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// The command does not apply to the active algorithm
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A scheduled task could not be armed
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for SimulatorError {
    fn from(err: ::config::ConfigError) -> Self {
        SimulatorError::Config(err.to_string())
    }
}

/// Result type alias for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;
