//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Errors that can occur while assembling a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global tracing subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
