//! The mediator facade.
//!
//! [`Mediator`] is the single entry point for dispatch:
//!
//! - [`send`](Mediator::send) / [`send_untyped`](Mediator::send_untyped)
//!   route a request to its one handler through the behavior chain
//! - [`publish`](Mediator::publish) / [`publish_untyped`](Mediator::publish_untyped)
//!   broadcast a notification to every handler observing it
//!
//! Adapters are built on the first dispatch of each message type and reused
//! afterwards. Typed and untyped entry points share the same adapter.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_core::{Mediator, CancellationToken};
//!
//! let mediator = Mediator::new(registry);
//! let cancel = CancellationToken::new();
//!
//! let balance = mediator.send(GetBalance { account: 7 }, &cancel).await?;
//! mediator.publish(Deposited { account: 7, amount: 10 }, &cancel).await?;
//! ```

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span};

use super::cache::WrapperCache;
use super::fanout::FailurePolicy;
use super::notification::{NotificationAdapter, NotificationDescriptor, NotificationDispatch};
use super::pipeline::AnyResponse;
use super::request::{RequestAdapter, RequestDescriptor, RequestDispatch};
use super::service::MediatorService;
use crate::foundation::{
    BoxedMessage, DispatchError, DispatchResult, Message, Notification, Request, TypeKey,
};
use crate::integration::CapabilityResolver;

/// Routes requests and notifications to the capabilities of a resolver.
pub struct Mediator {
    resolver: Arc<dyn CapabilityResolver>,
    requests: WrapperCache<dyn RequestDispatch>,
    notifications: WrapperCache<dyn NotificationDispatch>,
    failure_policy: FailurePolicy,
}

impl Mediator {
    /// Creates a mediator with the default failure policy.
    pub fn new(resolver: Arc<dyn CapabilityResolver>) -> Self {
        Self::builder(resolver).build()
    }

    /// Starts building a mediator.
    pub fn builder(resolver: Arc<dyn CapabilityResolver>) -> MediatorBuilder {
        MediatorBuilder {
            resolver,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// How failures of several notification handlers are reported.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Number of request types dispatched so far.
    pub fn cached_request_adapters(&self) -> usize {
        self.requests.len()
    }

    /// Number of notification types published so far.
    pub fn cached_notification_adapters(&self) -> usize {
        self.notifications.len()
    }

    /// Wraps this mediator as a `tower::Service` for requests of type `R`.
    pub fn service<R: Request>(self: &Arc<Self>, cancel: CancellationToken) -> MediatorService<R> {
        MediatorService::new(Arc::clone(self), cancel)
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Sends a request to its handler and returns the response.
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> DispatchResult<R::Response> {
        let span = debug_span!("send", request = type_name::<R>());
        async {
            ensure_live(cancel)?;
            let adapter = self.request_adapter(RequestDescriptor::of::<R>())?;
            let adapter = adapter
                .as_any()
                .downcast_ref::<RequestAdapter<R>>()
                .ok_or_else(|| malformed(type_name::<R>(), adapter.request_key()))?;
            until_cancelled(cancel, adapter.dispatch(&request, self.resolver.as_ref(), cancel)).await
        }
        .instrument(span)
        .await
    }

    /// Sends a type-erased request and returns the type-erased response.
    ///
    /// Fails with [`DispatchError::NullMessage`] when no message is given and
    /// [`DispatchError::NotARequest`] when the message is not a request,
    /// before any adapter is built or handler resolved.
    pub async fn send_untyped(
        &self,
        message: impl Into<Option<BoxedMessage>>,
        cancel: &CancellationToken,
    ) -> DispatchResult<AnyResponse> {
        let message = message.into().ok_or(DispatchError::NullMessage)?;
        let span = debug_span!("send", request = message.message_name());
        async {
            let descriptor = message
                .request_descriptor()
                .ok_or_else(|| DispatchError::NotARequest(message.message_name()))?;
            check_contract(message.as_message(), descriptor.key())?;
            ensure_live(cancel)?;

            let adapter = self.request_adapter(descriptor)?;
            until_cancelled(
                cancel,
                adapter.dispatch_erased(message.as_message(), self.resolver.as_ref(), cancel),
            )
            .await
        }
        .instrument(span)
        .await
    }

    fn request_adapter(
        &self,
        descriptor: RequestDescriptor,
    ) -> DispatchResult<Arc<dyn RequestDispatch>> {
        self.requests
            .get_or_try_insert_with(descriptor.key(), || {
                debug!(request = %descriptor.key(), "Caching request adapter");
                Ok(descriptor.build())
            })
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// Publishes a notification to every handler observing it.
    ///
    /// Returns once every handler has finished.
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> DispatchResult<()> {
        let span = debug_span!("publish", notification = type_name::<N>());
        async {
            ensure_live(cancel)?;
            let adapter = self.notification_adapter(NotificationDescriptor::of::<N>())?;
            let adapter = adapter
                .as_any()
                .downcast_ref::<NotificationAdapter<N>>()
                .ok_or_else(|| malformed(type_name::<N>(), adapter.notification_key()))?;
            until_cancelled(
                cancel,
                adapter.dispatch(
                    &notification,
                    self.resolver.as_ref(),
                    cancel,
                    self.failure_policy,
                ),
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Publishes a type-erased notification.
    ///
    /// Handlers registered for any supertype of the message's concrete type
    /// receive it.
    pub async fn publish_untyped(
        &self,
        message: impl Into<Option<BoxedMessage>>,
        cancel: &CancellationToken,
    ) -> DispatchResult<()> {
        let message = message.into().ok_or(DispatchError::NullMessage)?;
        let span = debug_span!("publish", notification = message.message_name());
        async {
            let descriptor = message
                .notification_descriptor()
                .ok_or_else(|| DispatchError::NotANotification(message.message_name()))?;
            check_contract(message.as_message(), descriptor.key())?;
            ensure_live(cancel)?;

            let adapter = self.notification_adapter(descriptor)?;
            until_cancelled(
                cancel,
                adapter.dispatch_erased(
                    message.as_message(),
                    self.resolver.as_ref(),
                    cancel,
                    self.failure_policy,
                ),
            )
            .await
        }
        .instrument(span)
        .await
    }

    fn notification_adapter(
        &self,
        descriptor: NotificationDescriptor,
    ) -> DispatchResult<Arc<dyn NotificationDispatch>> {
        self.notifications
            .get_or_try_insert_with(descriptor.key(), || {
                debug!(notification = %descriptor.key(), "Caching notification adapter");
                Ok(descriptor.build())
            })
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("requests", &self.requests)
            .field("notifications", &self.notifications)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Mediator`].
pub struct MediatorBuilder {
    resolver: Arc<dyn CapabilityResolver>,
    failure_policy: FailurePolicy,
}

impl MediatorBuilder {
    /// Sets how failures of several notification handlers are reported.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn build(self) -> Mediator {
        Mediator {
            resolver: self.resolver,
            requests: WrapperCache::new(),
            notifications: WrapperCache::new(),
            failure_policy: self.failure_policy,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn ensure_live(cancel: &CancellationToken) -> DispatchResult<()> {
    if cancel.is_cancelled() {
        return Err(DispatchError::Cancelled);
    }
    Ok(())
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    dispatch: impl Future<Output = DispatchResult<T>>,
) -> DispatchResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Dispatch cancelled");
            Err(DispatchError::Cancelled)
        }
        result = dispatch => result,
    }
}

fn check_contract(message: &dyn Message, declared: TypeKey) -> DispatchResult<()> {
    if message.as_any().type_id() != declared.id() {
        return Err(malformed(message.message_name(), declared));
    }
    Ok(())
}

fn malformed(message: &'static str, declared: TypeKey) -> DispatchError {
    DispatchError::MalformedContract {
        message,
        declared: declared.name(),
    }
}
