//! Error types for the dispatch core.
//!
//! Handlers and behaviors report failures as [`BoxError`], which keeps their
//! own error types intact. The mediator surfaces every failure as a
//! [`DispatchError`]; handler failures travel inside
//! [`DispatchError::Handler`] untouched.
//!
//! A handler that dispatches again and returns the nested failure with `?`
//! passes a `DispatchError` through its `BoxError`. The mediator unwraps it,
//! so variants such as [`DispatchError::HandlerNotFound`] can describe the
//! nested request rather than the one the caller sent.

use thiserror::Error;

use super::type_key::TypeKey;

/// Type-erased error returned by handlers and behaviors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by handlers and behaviors.
pub type HandlerResult<T> = Result<T, BoxError>;

/// Result type returned by the mediator.
pub type DispatchResult<T> = Result<T, DispatchError>;

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors surfaced by [`Mediator`](crate::Mediator) operations.
///
/// Nested dispatch errors are flattened: the type names carried by a variant
/// belong to whichever dispatch failed, which may be a request sent from
/// inside a handler. See [`DispatchError::from_boxed`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered for the request, or for a request sent
    /// from inside its pipeline.
    #[error("no handler registered for request `{request}` (response `{response}`)")]
    HandlerNotFound {
        /// Request type name.
        request: &'static str,
        /// Response type name.
        response: &'static str,
    },

    /// More than one handler is registered for the request.
    #[error("{count} handlers registered for request `{request}`, expected exactly one")]
    AmbiguousHandler {
        /// Request type name.
        request: &'static str,
        /// Number of handlers the resolver returned.
        count: usize,
    },

    /// A type-erased message does not implement the request contract.
    #[error("message `{0}` is not a request")]
    NotARequest(&'static str),

    /// A type-erased message does not implement the notification contract.
    #[error("message `{0}` is not a notification")]
    NotANotification(&'static str),

    /// A type-erased entry point received no message.
    #[error("no message was supplied")]
    NullMessage,

    /// The cancellation token was signalled.
    #[error("dispatch was cancelled")]
    Cancelled,

    /// A handler or behavior failed.
    #[error(transparent)]
    Handler(BoxError),

    /// The resolver returned a capability of the wrong type.
    #[error("capability resolved for {capability} is not a `{expected}`")]
    InvalidCapability {
        /// The capability key that was resolved.
        capability: String,
        /// The type the core expected to find.
        expected: &'static str,
    },

    /// An open behavior produced a response of the wrong type.
    #[error("behavior returned a response that is not a `{expected}` for request `{request}`")]
    ResponseMismatch {
        /// Request type name.
        request: &'static str,
        /// Expected response type name.
        expected: &'static str,
    },

    /// A message's descriptor names a different type than the message itself.
    #[error("message `{message}` declares the contract of `{declared}`")]
    MalformedContract {
        /// Name reported by the message.
        message: &'static str,
        /// Type named by its descriptor.
        declared: &'static str,
    },

    /// Several notification handlers failed.
    #[error("{} notification handlers failed", .0.len())]
    Aggregate(Vec<DispatchError>),
}

impl DispatchError {
    pub(crate) fn handler_not_found(request: TypeKey, response: TypeKey) -> Self {
        Self::HandlerNotFound {
            request: request.name(),
            response: response.name(),
        }
    }

    pub(crate) fn ambiguous(request: TypeKey, count: usize) -> Self {
        Self::AmbiguousHandler {
            request: request.name(),
            count,
        }
    }

    pub(crate) fn invalid_capability(
        capability: impl ToString,
        expected: &'static str,
    ) -> Self {
        Self::InvalidCapability {
            capability: capability.to_string(),
            expected,
        }
    }

    /// Converts a handler error into a dispatch error.
    ///
    /// A boxed `DispatchError` is unwrapped rather than nested, so a handler
    /// that returns `DispatchError::Cancelled` (or forwards the result of a
    /// nested dispatch) keeps its identity.
    ///
    /// The unwrapped error is not rewritten. A nested `send` that found no
    /// handler surfaces as `HandlerNotFound` naming the nested request type.
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<DispatchError>() {
            Ok(dispatch) => *dispatch,
            Err(other) => Self::Handler(other),
        }
    }

    /// Returns `true` for [`DispatchError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the original handler failure, if this is one.
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Downcasts the original handler failure to a concrete error type.
    pub fn downcast_handler_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.handler_error().and_then(|err| err.downcast_ref::<E>())
    }
}
