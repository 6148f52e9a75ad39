//! Configuration validation utilities.

use tracing_subscriber::filter::Directive;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HeraldConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    for (target, level) in &logging.filters {
        if target.trim().is_empty() {
            return Err(ConfigError::validation("logging.filters contains an empty target"));
        }
        let directive = format!("{target}={level}");
        if directive.parse::<Directive>().is_err() {
            return Err(ConfigError::validation(format!(
                "Invalid log filter directive: {directive}"
            )));
        }
    }

    Ok(())
}
