//! # Herald Core
//!
//! The dispatch core of the Herald mediator.
//!
//! Herald routes in-process messages to handlers supplied by an external
//! capability resolver. Requests go to exactly one handler through an
//! ordered chain of behaviors; notifications go to every handler observing
//! the notification or one of its supertypes.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Messages**: [`Message`], [`Request`], [`Notification`], [`BoxedMessage`]
//! - **Type identity**: [`TypeKey`]
//! - **Errors**: [`DispatchError`], [`BoxError`]
//!
//! ### Framework Layer
//!
//! - **Handlers**: [`RequestHandler`], [`NotificationHandler`]
//! - **Pipeline**: [`PipelineBehavior`], [`OpenBehavior`], [`compose`]
//! - **Adapters**: [`RequestAdapter`], [`NotificationAdapter`], cached in a [`WrapperCache`]
//! - **Fan-out**: [`fan_out`], [`FailurePolicy`]
//! - **Mediator**: [`Mediator`], plus [`MediatorService`] for tower
//!
//! ### Integration Layer
//!
//! - **Resolution port**: [`CapabilityResolver`], [`CapabilityKey`], [`Capability`]
//!
//! ## Data Flow
//!
//! ```text
//! ┌────────┐    ┌──────────┐    ┌──────────────┐    ┌─────────────────────┐
//! │ caller │───▶│ Mediator │───▶│ WrapperCache │───▶│ RequestAdapter      │──▶ behaviors ──▶ handler
//! └────────┘    └──────────┘    └──────────────┘    │ NotificationAdapter │──▶ fan-out ──▶ handlers
//!                                                   └─────────────────────┘
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

#[cfg(test)]
mod testing;

// Re-export foundation types
pub use foundation::{
    BoxError, BoxedMessage, DispatchError, DispatchResult, HandlerResult, Message, Notification,
    Request, Satisfies, TypeKey, Unit,
};

// Re-export framework types
pub use framework::{
    AnyResponse, ClosedBehavior, FailurePolicy, Mediator, MediatorBuilder, MediatorService, Next,
    NotificationAdapter, NotificationDescriptor, NotificationDispatch, NotificationFn,
    NotificationHandler, OpenBehavior, PipelineBehavior, RequestAdapter, RequestDescriptor,
    RequestDispatch, RequestFn, RequestHandler, Supertype, WrapperCache, compose, fan_out,
    notification_fn, request_fn,
};

// Re-export integration types
pub use integration::{Capability, CapabilityKey, CapabilityResolver, capability};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::{
        AnyResponse, FailurePolicy, Mediator, Next, NotificationHandler, OpenBehavior,
        PipelineBehavior, RequestHandler, notification_fn, request_fn,
    };
    pub use super::{CancellationToken, async_trait};
}
