//! # Herald Runtime
//!
//! Everything around the dispatch core that an application needs to run it:
//!
//! - Layered configuration (`herald.toml`, `HERALD_*` variables) via [`ConfigLoader`]
//! - Logging setup via [`LoggingBuilder`]
//! - An in-memory [`ServiceRegistry`] acting as the capability resolver
//! - [`HeraldRuntime`], wiring the three into a ready [`herald_core::Mediator`]
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! let runtime = HeraldRuntime::builder().profile("production").build()?;
//! runtime
//!     .registry()
//!     .request_handler(Transfer::handler(ledger.clone()))
//!     .notification_handler::<dyn AuditEvent>(AuditTrail::default());
//!
//! runtime.mediator().send(Transfer { from, to, amount }, &cancel).await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};
pub use registry::{RegistryStats, ServiceRegistry};
pub use runtime::{HeraldRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span types.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
