//! Configuration for the herald runtime.
//!
//! Settings are read from TOML/YAML files and `HERALD_*` environment
//! variables through [`ConfigLoader`], then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
