//! Capability resolution port.
//!
//! The core never owns handlers. On every call it asks a
//! [`CapabilityResolver`] for the capabilities registered under a
//! [`CapabilityKey`] and drops them when the call completes.
//!
//! A [`Capability`] is an `Arc<dyn Any + Send + Sync>` wrapping one of:
//!
//! | Key | Wrapped value |
//! |-----|---------------|
//! | `RequestHandler` | `Arc<dyn RequestHandler<R>>` |
//! | `NotificationHandler` | `Arc<dyn NotificationHandler<S>>` |
//! | `Behavior` | `Arc<dyn PipelineBehavior<R>>` or `Arc<dyn OpenBehavior>` |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::foundation::{DispatchError, DispatchResult, Request, TypeKey};

/// A type-erased handler or behavior supplied by the resolver.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// Wraps a value as a [`Capability`].
pub fn capability<T: Send + Sync + 'static>(value: T) -> Capability {
    Arc::new(value)
}

/// Identifies a capability family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKey {
    /// The single handler of a request type.
    RequestHandler {
        /// Request type.
        request: TypeKey,
        /// Response type.
        response: TypeKey,
    },
    /// Handlers observing a notification type or supertype.
    NotificationHandler {
        /// Notification or supertype.
        notification: TypeKey,
    },
    /// Behaviors wrapping a request/response pair, in registration order.
    Behavior {
        /// Request type.
        request: TypeKey,
        /// Response type.
        response: TypeKey,
    },
}

impl CapabilityKey {
    /// Key of the handler for `R`.
    pub fn request_handler<R: Request>() -> Self {
        Self::RequestHandler {
            request: TypeKey::of::<R>(),
            response: TypeKey::of::<R::Response>(),
        }
    }

    /// Key of the handlers observing `N`.
    pub fn notification_handler<N: ?Sized + 'static>() -> Self {
        Self::NotificationHandler {
            notification: TypeKey::of::<N>(),
        }
    }

    /// Key of the behaviors wrapping `R`.
    pub fn behavior<R: Request>() -> Self {
        Self::Behavior {
            request: TypeKey::of::<R>(),
            response: TypeKey::of::<R::Response>(),
        }
    }

    /// The message type this key is about.
    pub fn message(&self) -> TypeKey {
        match self {
            Self::RequestHandler { request, .. } | Self::Behavior { request, .. } => *request,
            Self::NotificationHandler { notification } => *notification,
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestHandler { request, response } => {
                write!(f, "request handler {request} -> {response}")
            }
            Self::NotificationHandler { notification } => {
                write!(f, "notification handler {notification}")
            }
            Self::Behavior { request, response } => {
                write!(f, "behavior {request} -> {response}")
            }
        }
    }
}

/// Supplies capabilities to the dispatch core.
///
/// Implementations must be safe to call concurrently. Ordering of
/// [`resolve_all`](CapabilityResolver::resolve_all) is significant: it is
/// the behavior nesting order and the notification handler order.
pub trait CapabilityResolver: Send + Sync {
    /// Returns every capability registered under `key`, in registration order.
    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Capability>;

    /// Returns the first capability registered under `key`.
    fn resolve_one(&self, key: &CapabilityKey) -> Option<Capability> {
        self.resolve_all(key).into_iter().next()
    }
}

impl<T: CapabilityResolver + ?Sized> CapabilityResolver for Arc<T> {
    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Capability> {
        (**self).resolve_all(key)
    }

    fn resolve_one(&self, key: &CapabilityKey) -> Option<Capability> {
        (**self).resolve_one(key)
    }
}

/// Recovers a typed capability, cloning the inner `Arc`.
pub(crate) fn downcast_capability<T: Clone + 'static>(
    key: &CapabilityKey,
    capability: &Capability,
) -> DispatchResult<T> {
    (**capability)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| DispatchError::invalid_capability(key, std::any::type_name::<T>()))
}
