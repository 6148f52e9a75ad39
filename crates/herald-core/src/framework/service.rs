//! Tower integration.
//!
//! [`MediatorService<R>`] exposes [`Mediator::send`] as a
//! `tower::Service<R>`, so ordinary tower layers (timeouts, concurrency
//! limits, buffering) can be stacked in front of dispatch:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let svc = ServiceBuilder::new()
//!     .concurrency_limit(64)
//!     .service(mediator.service::<GetBalance>(cancel));
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::Service;

use super::mediator::Mediator;
use crate::foundation::{DispatchError, DispatchResult, Request};

/// A tower [`Service`] sending requests of type `R` through a shared mediator.
///
/// Every call uses the token the service was created with.
pub struct MediatorService<R> {
    mediator: Arc<Mediator>,
    cancel: CancellationToken,
    _marker: PhantomData<fn(R)>,
}

impl<R> MediatorService<R> {
    pub fn new(mediator: Arc<Mediator>, cancel: CancellationToken) -> Self {
        Self {
            mediator,
            cancel,
            _marker: PhantomData,
        }
    }
}

impl<R> Clone for MediatorService<R> {
    fn clone(&self) -> Self {
        Self {
            mediator: Arc::clone(&self.mediator),
            cancel: self.cancel.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Request> Service<R> for MediatorService<R> {
    type Response = R::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<R::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(Err(DispatchError::Cancelled));
        }
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let mediator = Arc::clone(&self.mediator);
        let cancel = self.cancel.clone();
        async move { mediator.send(request, &cancel).await }.boxed()
    }
}
