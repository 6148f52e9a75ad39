//! Runtime assembly: configuration, logging, registry and mediator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! // Loads herald.toml and HERALD_* variables, installs logging.
//! let runtime = HeraldRuntime::builder().build()?;
//!
//! runtime.registry().request_handler(GetBalanceHandler::new(ledger));
//! let balance = runtime.mediator().send(GetBalance { account }, &cancel).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use herald_core::Mediator;
use tracing::{debug, info};

use crate::config::{ConfigLoader, HeraldConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::{self, LoggingError};
use crate::registry::ServiceRegistry;

/// A configured mediator over a [`ServiceRegistry`].
///
/// Handlers may be registered at any time; the mediator resolves them on
/// every dispatch.
pub struct HeraldRuntime {
    config: HeraldConfig,
    registry: Arc<ServiceRegistry>,
    mediator: Arc<Mediator>,
}

impl HeraldRuntime {
    /// Starts building a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Logging is left untouched; call [`HeraldRuntime::init_logging`] to
    /// install the configured subscriber.
    pub fn from_config(config: HeraldConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        let mediator = Mediator::builder(registry.clone())
            .failure_policy(config.dispatch.failure_policy)
            .build();

        Self {
            config,
            registry,
            mediator: Arc::new(mediator),
        }
    }

    /// Installs the global subscriber described by the logging config.
    pub fn init_logging(&self) -> RuntimeResult<()> {
        logging::init_from_config(&self.config.logging)?;
        Ok(())
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// The registry the mediator resolves capabilities from.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn mediator(&self) -> &Arc<Mediator> {
        &self.mediator
    }
}

impl Default for HeraldRuntime {
    fn default() -> Self {
        Self::from_config(HeraldConfig::default())
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HeraldRuntime`].
pub struct RuntimeBuilder {
    config: Option<HeraldConfig>,
    config_file: Option<PathBuf>,
    profile: Option<String>,
    load_env: bool,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            config_file: None,
            profile: None,
            load_env: true,
            init_logging: true,
        }
    }

    /// Uses `config` as is, skipping files and environment.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads this file instead of searching for `herald.toml`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Ignores `HERALD_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Whether [`build`](Self::build) installs the global subscriber
    /// (default: true). An already installed subscriber is kept; any other
    /// logging failure fails the build.
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let mut loader = ConfigLoader::new();
                if let Some(profile) = self.profile {
                    loader = loader.profile(profile);
                }
                if let Some(path) = self.config_file {
                    loader = loader.file(path);
                }
                if !self.load_env {
                    loader = loader.without_env();
                }
                loader.load()?
            }
        };

        let runtime = HeraldRuntime::from_config(config);
        if self.init_logging {
            match runtime.init_logging() {
                Err(RuntimeError::Logging(LoggingError::AlreadyInitialized)) => {
                    debug!("Keeping the installed subscriber");
                }
                result => result?,
            }
        }

        info!(
            log_level = %runtime.config.logging.level,
            failure_policy = ?runtime.config.dispatch.failure_policy,
            "Runtime initialized"
        );
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, LogOutput};
    use figment::Jail;
    use herald_core::{
        CancellationToken, DispatchError, FailurePolicy, Message, Notification,
        NotificationDescriptor, notification_fn,
    };
    use std::any::Any;

    #[derive(Debug, Clone)]
    struct Alarm;

    impl Message for Alarm {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn notification_descriptor(&self) -> Option<NotificationDescriptor> {
            Some(NotificationDescriptor::of::<Self>())
        }
    }

    impl Notification for Alarm {}

    fn failing(n: u8) -> impl herald_core::NotificationHandler<Alarm> {
        notification_fn(move |_: Alarm, _| async move {
            Err::<(), herald_core::BoxError>(format!("handler {n} failed").into())
        })
    }

    #[tokio::test]
    async fn configured_policy_reaches_mediator() {
        let mut config = HeraldConfig::default();
        config.dispatch.failure_policy = FailurePolicy::Aggregate;

        let runtime = HeraldRuntime::builder()
            .config(config)
            .init_logging(false)
            .build()
            .unwrap();
        assert_eq!(runtime.mediator().failure_policy(), FailurePolicy::Aggregate);

        runtime
            .registry()
            .notification_handler::<Alarm>(failing(1))
            .notification_handler::<Alarm>(failing(2));

        let err = runtime
            .mediator()
            .publish(Alarm, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            DispatchError::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_fails_build() {
        let err = HeraldRuntime::builder()
            .config_file("/nowhere/herald.toml")
            .without_env()
            .init_logging(false)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn unusable_log_file_fails_build() {
        Jail::expect_with(|jail| {
            jail.create_file("logs", "")?;
            let mut config = HeraldConfig::default();
            config.logging.output = LogOutput::File;
            config.logging.file_path = Some("logs/herald.log".into());

            let err = HeraldRuntime::builder().config(config).build().unwrap_err();
            assert!(matches!(
                err,
                RuntimeError::Logging(LoggingError::File(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn default_runtime_starts_empty() {
        let runtime = HeraldRuntime::default();
        assert_eq!(runtime.mediator().failure_policy(), FailurePolicy::FirstFailure);
        assert_eq!(runtime.registry().stats().request_handlers, 0);
    }
}
