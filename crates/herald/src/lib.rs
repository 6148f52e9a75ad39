//! # Herald
//!
//! An in-process mediator. Callers hand a message to the [`Mediator`]
//! without knowing who handles it:
//!
//! - A **request** goes to exactly one handler, wrapped by an ordered chain
//!   of pipeline behaviors, and produces a response.
//! - A **notification** goes to every handler registered for it or for any
//!   of its declared supertypes, concurrently.
//!
//! Handlers come from a [`CapabilityResolver`]; the runtime ships
//! `ServiceRegistry` as the default one.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[derive(Clone, Request)]
//! #[request(response = u64)]
//! struct GetBalance {
//!     account: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().build()?;
//!     runtime
//!         .registry()
//!         .request_handler(request_fn(|q: GetBalance, _| async move { Ok(q.account.len() as u64) }));
//!
//!     let cancel = CancellationToken::new();
//!     let balance = runtime
//!         .mediator()
//!         .send(GetBalance { account: "ada".into() }, &cancel)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[derive(Request)]` and `#[derive(Notification)]` (default)
//! - `runtime`: configuration, logging and `ServiceRegistry` (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use herald_core as core;
#[cfg(feature = "runtime")]
pub use herald_runtime as runtime;

pub use herald_core::*;

#[cfg(feature = "macros")]
pub use herald_macros::{Notification, Request};

#[cfg(feature = "runtime")]
pub use herald_runtime::{
    ConfigLoader, HeraldConfig, HeraldRuntime, LoggingBuilder, RegistryStats, ServiceRegistry,
    SpanEvents,
};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use herald_core::prelude::*;

    #[cfg(feature = "macros")]
    pub use herald_macros::{Notification, Request};

    #[cfg(feature = "runtime")]
    pub use herald_runtime::{HeraldRuntime, ServiceRegistry};
}
