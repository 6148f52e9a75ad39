//! Handler traits.
//!
//! Handlers receive the message by reference together with the caller's
//! cancellation token, which is passed through unmodified.
//!
//! Plain async closures can be used directly through [`request_fn`] and
//! [`notification_fn`]:
//!
//! ```rust,ignore
//! let handler = request_fn(|req: GetBalance, _cancel| async move {
//!     Ok(ledger.balance(req.account))
//! });
//! ```

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::foundation::{HandlerResult, Request};

// ============================================================================
// Handler Traits
// ============================================================================

/// Handles a single request type.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    /// Produces the response for `request`.
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> HandlerResult<R::Response>;
}

/// Observes a notification type or one of its supertypes.
///
/// `N` may be unsized, so handlers can be registered for a trait object
/// such as `dyn AuditEvent` and receive every notification that declares
/// it as a supertype.
#[async_trait]
pub trait NotificationHandler<N: ?Sized + Send + Sync + 'static>: Send + Sync + 'static {
    /// Reacts to `notification`.
    async fn handle(&self, notification: &N, cancel: &CancellationToken) -> HandlerResult<()>;
}

// ============================================================================
// Closure Handlers
// ============================================================================

/// A [`RequestHandler`] backed by an async closure.
///
/// The closure receives an owned clone of the request and of the token.
pub struct RequestFn<F, R> {
    f: F,
    _marker: PhantomData<fn(R)>,
}

/// Wraps an async closure as a [`RequestHandler`].
pub fn request_fn<R, F, Fut>(f: F) -> RequestFn<F, R>
where
    R: Request + Clone,
    F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<R::Response>> + Send + 'static,
{
    RequestFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<R, F, Fut> RequestHandler<R> for RequestFn<F, R>
where
    R: Request + Clone,
    F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<R::Response>> + Send + 'static,
{
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> HandlerResult<R::Response> {
        (self.f)(request.clone(), cancel.clone()).await
    }
}

/// A [`NotificationHandler`] backed by an async closure.
pub struct NotificationFn<F, N> {
    f: F,
    _marker: PhantomData<fn(N)>,
}

/// Wraps an async closure as a [`NotificationHandler`].
pub fn notification_fn<N, F, Fut>(f: F) -> NotificationFn<F, N>
where
    N: Clone + Send + Sync + 'static,
    F: Fn(N, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    NotificationFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<N, F, Fut> NotificationHandler<N> for NotificationFn<F, N>
where
    N: Clone + Send + Sync + 'static,
    F: Fn(N, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    async fn handle(&self, notification: &N, cancel: &CancellationToken) -> HandlerResult<()> {
        (self.f)(notification.clone(), cancel.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Ping, Tick};

    #[tokio::test]
    async fn closure_request_handler() {
        let handler = request_fn(|ping: Ping, _cancel| async move { Ok(ping.0 * 2) });
        let reply = handler.handle(&Ping(21), &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, 42);
    }

    #[tokio::test]
    async fn closure_notification_handler_sees_token() {
        let handler = notification_fn(|_tick: Tick, cancel: CancellationToken| async move {
            assert!(cancel.is_cancelled());
            Ok(())
        });
        let token = CancellationToken::new();
        token.cancel();
        handler.handle(&Tick(1), &token).await.unwrap();
    }
}
