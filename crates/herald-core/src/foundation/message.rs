//! Message contracts.
//!
//! Every value that travels through the mediator implements [`Message`].
//! A message is either a [`Request`] (exactly one handler, produces a
//! response) or a [`Notification`] (any number of handlers, no response).
//!
//! # Implementing by hand
//!
//! The derive macros in `herald-macros` generate these impls. Written out,
//! a request looks like this:
//!
//! ```rust,ignore
//! use std::any::Any;
//! use herald_core::{Message, Request, RequestDescriptor};
//!
//! struct GetBalance { account: u64 }
//!
//! impl Message for GetBalance {
//!     fn as_any(&self) -> &dyn Any { self }
//!
//!     fn request_descriptor(&self) -> Option<RequestDescriptor> {
//!         Some(RequestDescriptor::of::<Self>())
//!     }
//! }
//!
//! impl Request for GetBalance {
//!     type Response = u64;
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use futures::future::{self, Ready};

use crate::framework::notification::{NotificationDescriptor, Supertype};
use crate::framework::request::RequestDescriptor;

// ============================================================================
// Core Message Trait
// ============================================================================

/// The base trait for everything the mediator dispatches.
///
/// Messages are type-erased as `dyn Message` on the untyped entry points and
/// recovered with [`as_any`](Message::as_any). The descriptor methods are how
/// an erased value reveals which contract it implements.
pub trait Message: Any + Send + Sync {
    /// Human-readable name used in logs and errors.
    fn message_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the request contract, if this message is a request.
    fn request_descriptor(&self) -> Option<RequestDescriptor> {
        None
    }

    /// Returns the notification contract, if this message is a notification.
    fn notification_descriptor(&self) -> Option<NotificationDescriptor> {
        None
    }
}

/// A message handled by exactly one handler and producing a response.
///
/// Requests without a meaningful response use [`Unit`].
pub trait Request: Message + Sized {
    /// The value produced by the handler.
    type Response: Send + 'static;
}

/// A message delivered to every handler registered for it.
pub trait Notification: Message + Sized {
    /// Additional types whose handlers also observe this notification.
    ///
    /// Handlers registered for any listed supertype are invoked with a view
    /// of this instance obtained through [`Satisfies`].
    fn supertypes() -> Vec<Supertype<Self>> {
        Vec::new()
    }
}

// ============================================================================
// Supertype Views
// ============================================================================

/// Declares that `Self` can be observed as `S`.
///
/// Every type satisfies itself. Other impls name a parent the type embeds or
/// a trait object the type implements:
///
/// ```rust,ignore
/// impl Satisfies<SessionEvent> for LoggedIn {
///     fn upcast(&self) -> &SessionEvent { &self.session }
/// }
///
/// impl Satisfies<dyn AuditEvent> for LoggedIn {
///     fn upcast(&self) -> &(dyn AuditEvent + 'static) { self }
/// }
/// ```
pub trait Satisfies<S: ?Sized> {
    /// Returns the `S` view of this value.
    fn upcast(&self) -> &S;
}

impl<T: ?Sized> Satisfies<T> for T {
    fn upcast(&self) -> &T {
        self
    }
}

// ============================================================================
// Unit Response
// ============================================================================

/// Response of requests that produce no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Unit;

impl Unit {
    /// The single `Unit` value.
    pub const VALUE: Unit = Unit;

    /// An already-completed result, for handlers with nothing to await.
    pub fn completed<E>() -> Ready<Result<Unit, E>> {
        future::ready(Ok(Unit))
    }
}

impl From<()> for Unit {
    fn from(_: ()) -> Self {
        Unit
    }
}

// ============================================================================
// BoxedMessage
// ============================================================================

/// A shared, type-erased message.
///
/// This is the common base reference accepted by
/// [`Mediator::send_untyped`](crate::Mediator::send_untyped) and
/// [`Mediator::publish_untyped`](crate::Mediator::publish_untyped).
#[derive(Clone)]
pub struct BoxedMessage {
    inner: Arc<dyn Message>,
}

impl BoxedMessage {
    /// Wraps a message.
    pub fn new<M: Message>(message: M) -> Self {
        Self {
            inner: Arc::new(message),
        }
    }

    /// Wraps an already shared message.
    pub fn from_arc(inner: Arc<dyn Message>) -> Self {
        Self { inner }
    }

    /// Returns the erased message.
    pub fn as_message(&self) -> &dyn Message {
        self.inner.as_ref()
    }

    /// Returns `true` if the message is an `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.inner.as_any().is::<M>()
    }

    /// Downcasts to a concrete message type.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.inner.as_any().downcast_ref::<M>()
    }
}

impl Deref for BoxedMessage {
    type Target = dyn Message;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for BoxedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedMessage")
            .field(&self.inner.message_name())
            .finish()
    }
}
