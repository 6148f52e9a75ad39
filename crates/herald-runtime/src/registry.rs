//! In-memory capability registry.
//!
//! [`ServiceRegistry`] is the default [`CapabilityResolver`]: handlers and
//! behaviors are registered up front and resolved in registration order.
//!
//! ```rust,ignore
//! let registry = ServiceRegistry::new();
//! registry
//!     .request_handler::<GetBalance>(BalanceHandler::new(ledger.clone()))
//!     .notification_handler::<dyn AuditEvent>(AuditTrail::default())
//!     .open_behavior(Timing);
//! ```
//!
//! Open behaviors apply to every request type and are interleaved with the
//! closed behaviors of a request by registration order.

use std::collections::HashMap;
use std::sync::Arc;

use herald_core::{
    Capability, CapabilityKey, CapabilityResolver, NotificationHandler, OpenBehavior,
    PipelineBehavior, Request, RequestHandler, capability,
};
use parking_lot::RwLock;
use tracing::debug;

type Factory = Arc<dyn Fn() -> Capability + Send + Sync>;

/// How a capability is produced on resolution.
#[derive(Clone)]
enum Provider {
    /// The same instance for every resolution.
    Singleton(Capability),
    /// A fresh instance for every resolution.
    Factory(Factory),
}

impl Provider {
    fn provide(&self) -> Capability {
        match self {
            Self::Singleton(capability) => Arc::clone(capability),
            Self::Factory(factory) => factory(),
        }
    }
}

#[derive(Clone)]
struct Registration {
    seq: u64,
    provider: Provider,
}

#[derive(Default)]
struct Entries {
    keyed: HashMap<CapabilityKey, Vec<Registration>>,
    open_behaviors: Vec<Registration>,
    next_seq: u64,
}

impl Entries {
    /// Wraps `provider` with the next registration number.
    ///
    /// Callers hold the write lock, so `seq` order matches push order.
    fn register(&mut self, provider: Provider) -> Registration {
        let seq = self.next_seq;
        self.next_seq += 1;
        Registration { seq, provider }
    }
}

/// Registration counts by capability family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub request_handlers: usize,
    pub notification_handlers: usize,
    pub behaviors: usize,
    pub open_behaviors: usize,
}

/// Thread-safe store of handlers and behaviors keyed by [`CapabilityKey`].
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Entries>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: CapabilityKey, provider: Provider) -> &Self {
        let mut entries = self.entries.write();
        let registration = entries.register(provider);
        let seq = registration.seq;
        entries.keyed.entry(key).or_default().push(registration);
        drop(entries);
        debug!(capability = %key, seq, "Registered capability");
        self
    }

    /// Registers the handler for `R`.
    ///
    /// Registering a second handler for the same request makes dispatch of
    /// that request fail as ambiguous.
    pub fn request_handler<R: Request>(&self, handler: impl RequestHandler<R>) -> &Self {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.insert(
            CapabilityKey::request_handler::<R>(),
            Provider::Singleton(capability(handler)),
        )
    }

    /// Registers a handler for `R` built anew on every dispatch.
    pub fn request_handler_factory<R, H, F>(&self, factory: F) -> &Self
    where
        R: Request,
        H: RequestHandler<R>,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || {
            let handler: Arc<dyn RequestHandler<R>> = Arc::new(factory());
            capability(handler)
        });
        self.insert(CapabilityKey::request_handler::<R>(), Provider::Factory(factory))
    }

    /// Registers a handler observing `N`, which may be a trait object.
    pub fn notification_handler<N>(&self, handler: impl NotificationHandler<N>) -> &Self
    where
        N: ?Sized + Send + Sync + 'static,
    {
        let handler: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        self.insert(
            CapabilityKey::notification_handler::<N>(),
            Provider::Singleton(capability(handler)),
        )
    }

    /// Registers a handler observing `N` built anew on every publish.
    pub fn notification_handler_factory<N, H, F>(&self, factory: F) -> &Self
    where
        N: ?Sized + Send + Sync + 'static,
        H: NotificationHandler<N>,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || {
            let handler: Arc<dyn NotificationHandler<N>> = Arc::new(factory());
            capability(handler)
        });
        self.insert(
            CapabilityKey::notification_handler::<N>(),
            Provider::Factory(factory),
        )
    }

    /// Registers a behavior wrapping `R`. Earlier registrations run outermost.
    pub fn behavior<R: Request>(&self, behavior: impl PipelineBehavior<R>) -> &Self {
        let behavior: Arc<dyn PipelineBehavior<R>> = Arc::new(behavior);
        self.insert(
            CapabilityKey::behavior::<R>(),
            Provider::Singleton(capability(behavior)),
        )
    }

    /// Registers a behavior wrapping every request type.
    pub fn open_behavior(&self, behavior: impl OpenBehavior) -> &Self {
        let behavior: Arc<dyn OpenBehavior> = Arc::new(behavior);
        let mut entries = self.entries.write();
        let registration = entries.register(Provider::Singleton(capability(behavior)));
        let seq = registration.seq;
        entries.open_behaviors.push(registration);
        drop(entries);
        debug!(seq, "Registered open behavior");
        self
    }

    /// Number of registrations under `key`, open behaviors excluded.
    pub fn count(&self, key: &CapabilityKey) -> usize {
        self.entries.read().keyed.get(key).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> RegistryStats {
        let entries = self.entries.read();
        let mut stats = RegistryStats {
            open_behaviors: entries.open_behaviors.len(),
            ..Default::default()
        };
        for (key, registrations) in &entries.keyed {
            let slot = match key {
                CapabilityKey::RequestHandler { .. } => &mut stats.request_handlers,
                CapabilityKey::NotificationHandler { .. } => &mut stats.notification_handlers,
                CapabilityKey::Behavior { .. } => &mut stats.behaviors,
            };
            *slot += registrations.len();
        }
        stats
    }
}

impl CapabilityResolver for ServiceRegistry {
    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Capability> {
        // Providers are cloned out so factories run without the lock held.
        let registrations: Vec<Registration> = {
            let entries = self.entries.read();
            let keyed = entries.keyed.get(key).map(Vec::as_slice).unwrap_or_default();
            match key {
                CapabilityKey::Behavior { .. } if !entries.open_behaviors.is_empty() => {
                    let mut merged: Vec<Registration> = keyed
                        .iter()
                        .chain(&entries.open_behaviors)
                        .cloned()
                        .collect();
                    merged.sort_by_key(|r| r.seq);
                    merged
                }
                _ => keyed.to_vec(),
            }
        };
        registrations.iter().map(|r| r.provider.provide()).collect()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use herald_core::{
        AnyResponse, CancellationToken, DispatchError, HandlerResult, Mediator, Message, Next,
        RequestDescriptor, async_trait, request_fn,
    };

    #[derive(Debug, Clone)]
    struct Echo(u32);

    impl Message for Echo {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn request_descriptor(&self) -> Option<RequestDescriptor> {
            Some(RequestDescriptor::of::<Self>())
        }
    }

    impl Request for Echo {
        type Response = u32;
    }

    #[derive(Clone, Default)]
    struct Trail(Arc<parking_lot::Mutex<Vec<&'static str>>>);

    struct Closed(&'static str, Trail);

    #[async_trait]
    impl PipelineBehavior<Echo> for Closed {
        async fn handle(
            &self,
            _request: &Echo,
            _cancel: &CancellationToken,
            next: Next<'_, u32>,
        ) -> HandlerResult<u32> {
            self.1.0.lock().push(self.0);
            next().await
        }
    }

    struct Open(&'static str, Trail);

    #[async_trait]
    impl OpenBehavior for Open {
        async fn handle(
            &self,
            _request: &dyn Message,
            _cancel: &CancellationToken,
            next: Next<'_, AnyResponse>,
        ) -> HandlerResult<AnyResponse> {
            self.1.0.lock().push(self.0);
            next().await
        }
    }

    #[tokio::test]
    async fn resolves_handler_through_mediator() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.request_handler(request_fn(|e: Echo, _| async move { Ok(e.0 * 2) }));

        let mediator = Mediator::new(registry.clone());
        let reply = mediator.send(Echo(21), &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, 42);
        assert_eq!(registry.count(&CapabilityKey::request_handler::<Echo>()), 1);
    }

    #[tokio::test]
    async fn open_and_closed_behaviors_keep_registration_order() {
        let trail = Trail::default();
        let registry = Arc::new(ServiceRegistry::new());
        registry
            .open_behavior(Open("open-1", trail.clone()))
            .behavior(Closed("closed-2", trail.clone()))
            .open_behavior(Open("open-3", trail.clone()))
            .request_handler(request_fn(|e: Echo, _| async move { Ok(e.0) }));

        let mediator = Mediator::new(registry.clone());
        assert_eq!(mediator.send(Echo(7), &CancellationToken::new()).await.unwrap(), 7);
        assert_eq!(*trail.0.lock(), vec!["open-1", "closed-2", "open-3"]);

        let stats = registry.stats();
        assert_eq!(stats.behaviors, 1);
        assert_eq!(stats.open_behaviors, 2);
        assert_eq!(stats.request_handlers, 1);
    }

    #[tokio::test]
    async fn factory_builds_a_handler_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ServiceRegistry::new());
        let counter = Arc::clone(&built);
        registry.request_handler_factory::<Echo, _, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            request_fn(|e: Echo, _| async move { Ok(e.0 + 1) })
        });

        let mediator = Mediator::new(registry);
        let cancel = CancellationToken::new();
        for n in 0..3 {
            assert_eq!(mediator.send(Echo(n), &cancel).await.unwrap(), n + 1);
        }
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn duplicate_handlers_are_kept_and_rejected_on_dispatch() {
        let registry = Arc::new(ServiceRegistry::new());
        registry
            .request_handler(request_fn(|e: Echo, _| async move { Ok(e.0) }))
            .request_handler(request_fn(|e: Echo, _| async move { Ok(e.0) }));

        let err = Mediator::new(registry)
            .send(Echo(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AmbiguousHandler { count: 2, .. }));
    }

    #[test]
    fn concurrent_registration_keeps_one_order() {
        let registry = Arc::new(ServiceRegistry::new());
        let trail = Trail::default();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let trail = trail.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        registry.behavior(Closed("closed", trail.clone()));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let key = CapabilityKey::behavior::<Echo>();
        let closed_only = registry.resolve_all(&key);
        registry.open_behavior(Open("open", trail));
        let merged = registry.resolve_all(&key);

        assert_eq!(closed_only.len(), 400);
        assert_eq!(merged.len(), 401);
        for (before, after) in closed_only.iter().zip(&merged) {
            assert!(Arc::ptr_eq(before, after));
        }
    }

    #[test]
    fn unknown_key_resolves_to_nothing() {
        let registry = ServiceRegistry::new();
        assert!(registry.resolve_all(&CapabilityKey::behavior::<Echo>()).is_empty());
        assert!(registry.resolve_one(&CapabilityKey::request_handler::<Echo>()).is_none());
        assert_eq!(registry.stats(), RegistryStats::default());
    }
}
