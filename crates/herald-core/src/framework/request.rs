//! Request path adapter.
//!
//! [`RequestAdapter<R>`] is built once per request type and cached by the
//! mediator. It holds no business state, only the precomputed capability
//! keys for `R`. Each dispatch resolves the handler and the behaviors
//! afresh.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::handler::RequestHandler;
use super::pipeline::{AnyResponse, ClosedBehavior, Next, OpenBehavior, PipelineBehavior, compose};
use crate::foundation::{DispatchError, DispatchResult, Message, Request, TypeKey};
use crate::integration::resolver::downcast_capability;
use crate::integration::{Capability, CapabilityKey, CapabilityResolver};

// ============================================================================
// Erased Dispatch
// ============================================================================

/// Object-safe view of a [`RequestAdapter`], stored in the mediator's cache.
pub trait RequestDispatch: Send + Sync + 'static {
    /// The request type this adapter serves.
    fn request_key(&self) -> TypeKey;

    /// Returns a reference to self as `Any` for recovering the typed adapter.
    fn as_any(&self) -> &dyn Any;

    /// Dispatches an erased request, returning an erased response.
    fn dispatch_erased<'a>(
        &'a self,
        message: &'a dyn Message,
        resolver: &'a dyn CapabilityResolver,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<AnyResponse>>;
}

/// The request contract of a message type.
///
/// Returned by [`Message::request_descriptor`]; lets an erased message
/// produce the adapter for its concrete type.
#[derive(Clone, Copy)]
pub struct RequestDescriptor {
    key: TypeKey,
    build: fn() -> Arc<dyn RequestDispatch>,
}

impl RequestDescriptor {
    /// Descriptor of `R`.
    pub fn of<R: Request>() -> Self {
        Self {
            key: TypeKey::of::<R>(),
            build: build_adapter::<R>,
        }
    }

    /// The request type described.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn build(&self) -> Arc<dyn RequestDispatch> {
        (self.build)()
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestDescriptor").field(&self.key).finish()
    }
}

fn build_adapter<R: Request>() -> Arc<dyn RequestDispatch> {
    Arc::new(RequestAdapter::<R>::new())
}

// ============================================================================
// RequestAdapter
// ============================================================================

/// Dispatches requests of type `R`.
pub struct RequestAdapter<R> {
    handler_key: CapabilityKey,
    behavior_key: CapabilityKey,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Request> RequestAdapter<R> {
    pub fn new() -> Self {
        debug!(request = std::any::type_name::<R>(), "Building request adapter");
        Self {
            handler_key: CapabilityKey::request_handler::<R>(),
            behavior_key: CapabilityKey::behavior::<R>(),
            _marker: PhantomData,
        }
    }

    /// Resolves the handler and behaviors for `R` and runs the chain.
    ///
    /// With no behaviors registered the handler is invoked directly.
    pub async fn dispatch(
        &self,
        request: &R,
        resolver: &dyn CapabilityResolver,
        cancel: &CancellationToken,
    ) -> DispatchResult<R::Response> {
        let handler = self.resolve_handler(resolver)?;
        let behaviors = self.resolve_behaviors(resolver)?;

        let result = if behaviors.is_empty() {
            handler.handle(request, cancel).await
        } else {
            let handler = &handler;
            let terminal: Next<'_, R::Response> = Box::new(move || handler.handle(request, cancel));
            compose(&behaviors, request, cancel, terminal)().await
        };

        result.map_err(DispatchError::from_boxed)
    }

    fn resolve_handler(
        &self,
        resolver: &dyn CapabilityResolver,
    ) -> DispatchResult<Arc<dyn RequestHandler<R>>> {
        let candidates = resolver.resolve_all(&self.handler_key);
        match candidates.as_slice() {
            [] => {
                debug!(key = %self.handler_key, "No request handler registered");
                Err(DispatchError::handler_not_found(
                    TypeKey::of::<R>(),
                    TypeKey::of::<R::Response>(),
                ))
            }
            [only] => downcast_capability(&self.handler_key, only),
            many => Err(DispatchError::ambiguous(TypeKey::of::<R>(), many.len())),
        }
    }

    fn resolve_behaviors(
        &self,
        resolver: &dyn CapabilityResolver,
    ) -> DispatchResult<Vec<Arc<dyn PipelineBehavior<R>>>> {
        resolver
            .resolve_all(&self.behavior_key)
            .iter()
            .map(|capability| self.close_behavior(capability))
            .collect()
    }

    fn close_behavior(&self, capability: &Capability) -> DispatchResult<Arc<dyn PipelineBehavior<R>>> {
        if let Some(closed) = (**capability).downcast_ref::<Arc<dyn PipelineBehavior<R>>>() {
            return Ok(Arc::clone(closed));
        }
        if let Some(open) = (**capability).downcast_ref::<Arc<dyn OpenBehavior>>() {
            let closed: Arc<dyn PipelineBehavior<R>> =
                Arc::new(ClosedBehavior::<R>::new(Arc::clone(open)));
            return Ok(closed);
        }
        Err(DispatchError::invalid_capability(
            self.behavior_key,
            std::any::type_name::<Arc<dyn PipelineBehavior<R>>>(),
        ))
    }
}

impl<R: Request> Default for RequestAdapter<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Request> RequestDispatch for RequestAdapter<R> {
    fn request_key(&self) -> TypeKey {
        TypeKey::of::<R>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dispatch_erased<'a>(
        &'a self,
        message: &'a dyn Message,
        resolver: &'a dyn CapabilityResolver,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<AnyResponse>> {
        async move {
            let request = message.as_any().downcast_ref::<R>().ok_or_else(|| {
                DispatchError::MalformedContract {
                    message: message.message_name(),
                    declared: std::any::type_name::<R>(),
                }
            })?;
            let response = self.dispatch(request, resolver, cancel).await?;
            Ok(Box::new(response) as AnyResponse)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::handler::request_fn;
    use crate::testing::{Ping, Recorder, TestResolver, Trace};
    use async_trait::async_trait;

    struct ShortCircuit;

    #[async_trait]
    impl PipelineBehavior<Ping> for ShortCircuit {
        async fn handle(
            &self,
            _request: &Ping,
            _cancel: &CancellationToken,
            _next: Next<'_, u64>,
        ) -> crate::HandlerResult<u64> {
            Ok(99)
        }
    }

    struct Doubling;

    #[async_trait]
    impl OpenBehavior for Doubling {
        async fn handle(
            &self,
            _request: &dyn Message,
            _cancel: &CancellationToken,
            next: Next<'_, AnyResponse>,
        ) -> crate::HandlerResult<AnyResponse> {
            let response = next().await?;
            match response.downcast::<u64>() {
                Ok(n) => Ok(Box::new(*n * 2) as AnyResponse),
                Err(other) => Ok(other),
            }
        }
    }

    struct Swapping;

    #[async_trait]
    impl OpenBehavior for Swapping {
        async fn handle(
            &self,
            _request: &dyn Message,
            _cancel: &CancellationToken,
            _next: Next<'_, AnyResponse>,
        ) -> crate::HandlerResult<AnyResponse> {
            Ok(Box::new("not a number") as AnyResponse)
        }
    }

    #[tokio::test]
    async fn dispatches_without_behaviors() {
        let resolver = TestResolver::default();
        resolver.request_handler(request_fn(|p: Ping, _| async move { Ok(p.0 + 1) }));

        let adapter = RequestAdapter::<Ping>::new();
        let reply = adapter
            .dispatch(&Ping(1), &resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, 2);
    }

    #[tokio::test]
    async fn short_circuit_skips_handler() {
        let recorder = Recorder::default();
        let resolver = TestResolver::default();
        resolver
            .request_handler(Trace::new("handler", recorder.clone(), 5))
            .behavior::<Ping>(Trace::new("outer", recorder.clone(), 0))
            .behavior::<Ping>(ShortCircuit);

        let adapter = RequestAdapter::<Ping>::new();
        let reply = adapter
            .dispatch(&Ping(1), &resolver, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, 99);
        assert_eq!(recorder.entries(), ["outer-before", "outer-after"]);
    }

    #[tokio::test]
    async fn open_behavior_wraps_typed_handler() {
        let resolver = TestResolver::default();
        resolver
            .request_handler(request_fn(|p: Ping, _| async move { Ok(p.0) }))
            .open_behavior::<Ping>(Doubling);

        let adapter = RequestAdapter::<Ping>::new();
        let reply = adapter
            .dispatch(&Ping(21), &resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, 42);
    }

    #[tokio::test]
    async fn open_behavior_with_wrong_response_type() {
        let resolver = TestResolver::default();
        resolver
            .request_handler(request_fn(|p: Ping, _| async move { Ok(p.0) }))
            .open_behavior::<Ping>(Swapping);

        let err = RequestAdapter::<Ping>::new()
            .dispatch(&Ping(1), &resolver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ResponseMismatch { .. }));
    }

    #[tokio::test]
    async fn duplicate_handlers_are_ambiguous() {
        let resolver = TestResolver::default();
        resolver
            .request_handler(request_fn(|p: Ping, _| async move { Ok(p.0) }))
            .request_handler(request_fn(|p: Ping, _| async move { Ok(p.0) }));

        let err = RequestAdapter::<Ping>::new()
            .dispatch(&Ping(1), &resolver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AmbiguousHandler { count: 2, .. }));
    }

    #[tokio::test]
    async fn wrong_capability_is_rejected() {
        let resolver = TestResolver::default();
        resolver.raw(CapabilityKey::request_handler::<Ping>(), crate::capability("nope"));

        let err = RequestAdapter::<Ping>::new()
            .dispatch(&Ping(1), &resolver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCapability { .. }));
    }

    #[tokio::test]
    async fn erased_dispatch_boxes_response() {
        let resolver = TestResolver::default();
        resolver.request_handler(request_fn(|p: Ping, _| async move { Ok(p.0 * 3) }));

        let adapter = build_adapter::<Ping>();
        assert_eq!(adapter.request_key(), TypeKey::of::<Ping>());

        let response = adapter
            .dispatch_erased(&Ping(3), &resolver, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.downcast_ref::<u64>(), Some(&9));
    }
}
