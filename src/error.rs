use thiserror::Error;

use crate::adapters::switch::DriverError;

/// Result type for control session operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// Control session errors
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("switch driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}
