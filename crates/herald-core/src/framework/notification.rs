//! Notification path adapter and supertype routing.
//!
//! A notification `N` reaches the handlers registered for `N` itself and for
//! every [`Supertype`] listed by [`Notification::supertypes`]. The list is
//! flattened into routes once, when [`NotificationAdapter<N>`] is built;
//! dispatch only resolves handlers per route and fans out.
//!
//! Supertypes come in two shapes:
//!
//! - a parent struct embedded in the notification (`Supertype::of::<Parent>()`)
//! - a trait object the notification implements (`Supertype::of::<dyn AuditEvent>()`)
//!
//! Supertypes of a parent are carried over with [`Supertype::lift`].

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::fanout::{FailurePolicy, fan_out};
use super::handler::NotificationHandler;
use crate::foundation::{
    DispatchError, DispatchResult, HandlerResult, Message, Notification, Satisfies, TypeKey,
};
use crate::integration::resolver::downcast_capability;
use crate::integration::{Capability, CapabilityKey, CapabilityResolver};

// ============================================================================
// Supertypes
// ============================================================================

/// Starts one handler invocation for a notification of type `N`.
///
/// Receives a capability resolved for the supertype, downcasts it to the
/// matching handler and returns the handler's future over the upcast view.
pub type Observer<N> = Arc<
    dyn for<'a> Fn(
            &Capability,
            &'a N,
            &'a CancellationToken,
        ) -> DispatchResult<BoxFuture<'a, HandlerResult<()>>>
        + Send
        + Sync,
>;

fn observer<N, F>(f: F) -> Observer<N>
where
    N: 'static,
    F: for<'a> Fn(
            &Capability,
            &'a N,
            &'a CancellationToken,
        ) -> DispatchResult<BoxFuture<'a, HandlerResult<()>>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// A type whose handlers also observe notifications of type `N`.
pub struct Supertype<N> {
    key: TypeKey,
    observer: Observer<N>,
}

impl<N: Send + Sync + 'static> Supertype<N> {
    /// Routes `N` to the handlers of `S`.
    pub fn of<S>() -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        N: Satisfies<S>,
    {
        let key = CapabilityKey::notification_handler::<S>();
        Self {
            key: TypeKey::of::<S>(),
            observer: observer(move |capability, notification, cancel| {
                let handler: Arc<dyn NotificationHandler<S>> =
                    downcast_capability(&key, capability)?;
                Ok(async move {
                    handler
                        .handle(<N as Satisfies<S>>::upcast(notification), cancel)
                        .await
                }
                .boxed())
            }),
        }
    }

    /// Carries a supertype of the parent `P` over to `N`.
    pub fn lift<P>(parent: Supertype<P>) -> Self
    where
        P: Send + Sync + 'static,
        N: Satisfies<P>,
    {
        let inner = parent.observer;
        Self {
            key: parent.key,
            observer: observer(move |capability, notification, cancel| {
                inner(capability, <N as Satisfies<P>>::upcast(notification), cancel)
            }),
        }
    }

    /// The supertype's identity.
    pub fn key(&self) -> TypeKey {
        self.key
    }
}

impl<N> Clone for Supertype<N> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<N> fmt::Debug for Supertype<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Supertype").field(&self.key).finish()
    }
}

// ============================================================================
// Erased Dispatch
// ============================================================================

/// Object-safe view of a [`NotificationAdapter`], stored in the mediator's cache.
pub trait NotificationDispatch: Send + Sync + 'static {
    /// The notification type this adapter serves.
    fn notification_key(&self) -> TypeKey;

    /// Types whose handlers this adapter reaches, the notification itself first.
    fn route_keys(&self) -> Vec<TypeKey>;

    /// Returns a reference to self as `Any` for recovering the typed adapter.
    fn as_any(&self) -> &dyn Any;

    /// Publishes an erased notification.
    fn dispatch_erased<'a>(
        &'a self,
        message: &'a dyn Message,
        resolver: &'a dyn CapabilityResolver,
        cancel: &'a CancellationToken,
        policy: FailurePolicy,
    ) -> BoxFuture<'a, DispatchResult<()>>;
}

/// The notification contract of a message type.
#[derive(Clone, Copy)]
pub struct NotificationDescriptor {
    key: TypeKey,
    build: fn() -> Arc<dyn NotificationDispatch>,
}

impl NotificationDescriptor {
    /// Descriptor of `N`.
    pub fn of<N: Notification>() -> Self {
        Self {
            key: TypeKey::of::<N>(),
            build: build_adapter::<N>,
        }
    }

    /// The notification type described.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn build(&self) -> Arc<dyn NotificationDispatch> {
        (self.build)()
    }
}

impl fmt::Debug for NotificationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NotificationDescriptor")
            .field(&self.key)
            .finish()
    }
}

fn build_adapter<N: Notification>() -> Arc<dyn NotificationDispatch> {
    Arc::new(NotificationAdapter::<N>::new())
}

// ============================================================================
// NotificationAdapter
// ============================================================================

struct Route<N> {
    key: CapabilityKey,
    observer: Observer<N>,
}

/// Publishes notifications of type `N`.
pub struct NotificationAdapter<N> {
    routes: Vec<Route<N>>,
    _marker: PhantomData<fn() -> N>,
}

impl<N: Notification> NotificationAdapter<N> {
    pub fn new() -> Self {
        let mut seen = HashSet::new();
        let routes: Vec<Route<N>> = std::iter::once(Supertype::<N>::of::<N>())
            .chain(N::supertypes())
            .filter(|supertype| seen.insert(supertype.key))
            .map(|supertype| Route {
                key: CapabilityKey::NotificationHandler {
                    notification: supertype.key,
                },
                observer: supertype.observer,
            })
            .collect();

        debug!(
            notification = std::any::type_name::<N>(),
            routes = routes.len(),
            "Building notification adapter"
        );

        Self {
            routes,
            _marker: PhantomData,
        }
    }

    /// Resolves every handler on every route and runs them concurrently.
    ///
    /// Completes only after all invocations have finished.
    pub async fn dispatch(
        &self,
        notification: &N,
        resolver: &dyn CapabilityResolver,
        cancel: &CancellationToken,
        policy: FailurePolicy,
    ) -> DispatchResult<()> {
        let mut invocations = Vec::new();
        for route in &self.routes {
            for capability in resolver.resolve_all(&route.key) {
                invocations.push((route.observer)(&capability, notification, cancel)?);
            }
        }

        if invocations.is_empty() {
            debug!(
                notification = std::any::type_name::<N>(),
                "No notification handlers registered"
            );
        }

        fan_out(invocations, policy).await
    }
}

impl<N: Notification> Default for NotificationAdapter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Notification> NotificationDispatch for NotificationAdapter<N> {
    fn notification_key(&self) -> TypeKey {
        TypeKey::of::<N>()
    }

    fn route_keys(&self) -> Vec<TypeKey> {
        self.routes.iter().map(|route| route.key.message()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispatch_erased<'a>(
        &'a self,
        message: &'a dyn Message,
        resolver: &'a dyn CapabilityResolver,
        cancel: &'a CancellationToken,
        policy: FailurePolicy,
    ) -> BoxFuture<'a, DispatchResult<()>> {
        async move {
            let notification = message.as_any().downcast_ref::<N>().ok_or_else(|| {
                DispatchError::MalformedContract {
                    message: message.message_name(),
                    declared: std::any::type_name::<N>(),
                }
            })?;
            self.dispatch(notification, resolver, cancel, policy).await
        }
        .boxed()
    }
}
