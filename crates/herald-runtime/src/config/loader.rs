//! Configuration loader using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`herald.{profile}.toml` / `herald.{profile}.yaml`)
//! 3. Main config file (`herald.toml` / `herald.yaml`)
//! 4. Environment variables (`HERALD_*`)
//! 5. Programmatic overrides passed to [`ConfigLoader::merge`]
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files
//! - `yaml-config`: enables YAML configuration files (`herald.yaml`, `herald.yml`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `HERALD_` prefix with `__` as the nesting separator:
//!
//! - `HERALD_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `HERALD_DISPATCH__FAILURE_POLICY=aggregate` → `dispatch.failure_policy = "aggregate"`
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/herald.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HeraldConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "HERALD_";
const PROFILE_VAR: &str = "HERALD_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` and `prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `HERALD_PROFILE`, defaulting to [`Profile::Development`].
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (skips the search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`<config_dir>/herald`) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("herald"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, on top of every other source.
    ///
    /// ```rust,ignore
    /// let config = ConfigLoader::new()
    ///     .merge(HeraldConfig {
    ///         dispatch: DispatchConfig { failure_policy: FailurePolicy::Aggregate },
    ///         ..Default::default()
    ///     })
    ///     .load()?;
    /// ```
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<HeraldConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: HeraldConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            failure_policy = ?config.dispatch.failure_policy,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HeraldConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["profile"])
                    .split("__"),
            );
        }

        let overrides = std::mem::take(&mut self.overrides);
        Ok(figment.merge(overrides))
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("herald"));
        }
        paths
    }

    /// Iterates `search_paths × base_names`, merging a profile-specific variant
    /// before its base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) =
                self.load_format_files(figment, &search_paths, &["herald.toml"], |fig, path| {
                    fig.merge(Toml::file(path))
                });
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["herald.yaml", "herald.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default search paths and environment.
pub fn load_config() -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HeraldConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogLevel, LogOutput};
    use figment::Jail;
    use herald_core::FailurePolicy;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.dispatch.failure_policy, FailurePolicy::FirstFailure);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                [logging]
                level = "warn"
                output = "stderr"

                [dispatch]
                failure_policy = "aggregate"
                "#,
            )?;
            jail.set_env("HERALD_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.logging.output, LogOutput::Stderr);
            assert_eq!(config.dispatch.failure_policy, FailurePolicy::Aggregate);

            let mut forced = HeraldConfig::default();
            forced.logging.level = LogLevel::Error;
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(forced)
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Error);
            Ok(())
        });
    }

    #[test]
    fn base_file_overrides_profile_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.production.toml",
                r#"
                [logging]
                level = "trace"
                thread_ids = true
                "#,
            )?;
            jail.create_file("herald.toml", "[logging]\nlevel = \"warn\"\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert!(config.logging.thread_ids);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/herald.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("herald.ini", "level = debug")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("herald.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("herald.toml", "[logging]\noutput = \"file\"\n")?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_VAR, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env(PROFILE_VAR, "staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }
}
