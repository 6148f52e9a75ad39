//! Pipeline behaviors and their composition.
//!
//! Behaviors wrap the handler of a request. Each receives the request and a
//! [`Next`] continuation standing for everything nested inside it; calling
//! `next` runs the rest of the chain, not calling it short-circuits.
//!
//! For behaviors `[B1, B2]` around handler `H` the execution order is:
//!
//! ```text
//! B1 before -> B2 before -> H -> B2 after -> B1 after
//! ```
//!
//! # Open behaviors
//!
//! An [`OpenBehavior`] applies to every request type. It sees the request
//! as `&dyn Message` and the response as [`AnyResponse`]. The request
//! adapter wraps it in a [`ClosedBehavior<R>`] for the concrete type.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::foundation::{DispatchError, HandlerResult, Message, Request};

/// The rest of the chain. Consumed by calling it at most once.
pub type Next<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, HandlerResult<T>> + Send + 'a>;

/// A type-erased response.
pub type AnyResponse = Box<dyn Any + Send>;

/// Cross-cutting logic wrapped around the handler of `R`.
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync + 'static {
    /// Runs this behavior. Call `next` to continue the chain.
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
        next: Next<'_, R::Response>,
    ) -> HandlerResult<R::Response>;
}

/// A behavior that applies to every request type.
#[async_trait]
pub trait OpenBehavior: Send + Sync + 'static {
    /// Runs this behavior. The response it returns must be the one produced
    /// by `next` or another value of the same concrete type.
    async fn handle(
        &self,
        request: &dyn Message,
        cancel: &CancellationToken,
        next: Next<'_, AnyResponse>,
    ) -> HandlerResult<AnyResponse>;
}

/// An [`OpenBehavior`] specialised to the request type `R`.
pub struct ClosedBehavior<R> {
    inner: Arc<dyn OpenBehavior>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Request> ClosedBehavior<R> {
    pub fn new(inner: Arc<dyn OpenBehavior>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for ClosedBehavior<R> {
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
        next: Next<'_, R::Response>,
    ) -> HandlerResult<R::Response> {
        let erased: Next<'_, AnyResponse> = Box::new(move || {
            async move { next().await.map(|response| Box::new(response) as AnyResponse) }.boxed()
        });

        let response = self.inner.handle(request, cancel, erased).await?;
        match response.downcast::<R::Response>() {
            Ok(response) => Ok(*response),
            Err(_) => Err(DispatchError::ResponseMismatch {
                request: std::any::type_name::<R>(),
                expected: std::any::type_name::<R::Response>(),
            }
            .into()),
        }
    }
}

/// Folds `behaviors` around `terminal`, first behavior outermost.
///
/// Each behavior and the terminal run at most once per returned
/// continuation.
pub fn compose<'a, R: Request>(
    behaviors: &'a [Arc<dyn PipelineBehavior<R>>],
    request: &'a R,
    cancel: &'a CancellationToken,
    terminal: Next<'a, R::Response>,
) -> Next<'a, R::Response> {
    behaviors.iter().rev().fold(terminal, |next, behavior| {
        let wrapped: Next<'a, R::Response> =
            Box::new(move || behavior.handle(request, cancel, next));
        wrapped
    })
}
