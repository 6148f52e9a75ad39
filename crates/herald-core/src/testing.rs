//! Fixtures shared by the unit tests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::framework::{
    NotificationDescriptor, NotificationHandler, OpenBehavior, PipelineBehavior,
    RequestDescriptor, RequestHandler,
};
use crate::framework::pipeline::Next;
use crate::{
    Capability, CapabilityKey, CapabilityResolver, HandlerResult, Message, Notification,
    Request, Satisfies, Supertype,
};

// ============================================================================
// Resolver
// ============================================================================

/// In-memory resolver counting every resolution.
#[derive(Default)]
pub(crate) struct TestResolver {
    entries: Mutex<HashMap<CapabilityKey, Vec<Capability>>>,
    calls: AtomicUsize,
}

impl TestResolver {
    pub fn raw(&self, key: CapabilityKey, capability: Capability) -> &Self {
        self.entries.lock().entry(key).or_default().push(capability);
        self
    }

    pub fn request_handler<R: Request>(&self, handler: impl RequestHandler<R>) -> &Self {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.raw(CapabilityKey::request_handler::<R>(), Arc::new(handler))
    }

    pub fn notification_handler<N: ?Sized + Send + Sync + 'static>(
        &self,
        handler: impl NotificationHandler<N>,
    ) -> &Self {
        let handler: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        self.raw(CapabilityKey::notification_handler::<N>(), Arc::new(handler))
    }

    pub fn behavior<R: Request>(&self, behavior: impl PipelineBehavior<R>) -> &Self {
        let behavior: Arc<dyn PipelineBehavior<R>> = Arc::new(behavior);
        self.raw(CapabilityKey::behavior::<R>(), Arc::new(behavior))
    }

    pub fn open_behavior<R: Request>(&self, behavior: impl OpenBehavior) -> &Self {
        let behavior: Arc<dyn OpenBehavior> = Arc::new(behavior);
        self.raw(CapabilityKey::behavior::<R>(), Arc::new(behavior))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CapabilityResolver for TestResolver {
    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Capability> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().get(key).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Recording
// ============================================================================

/// Shared, ordered log of events.
#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Handler or behavior that records its name around the call.
pub(crate) struct Trace {
    name: &'static str,
    recorder: Recorder,
    reply: u64,
}

impl Trace {
    pub fn new(name: &'static str, recorder: Recorder, reply: u64) -> Self {
        Self {
            name,
            recorder,
            reply,
        }
    }
}

#[async_trait]
impl RequestHandler<Ping> for Trace {
    async fn handle(&self, _request: &Ping, _cancel: &CancellationToken) -> HandlerResult<u64> {
        self.recorder.push(self.name);
        Ok(self.reply)
    }
}

#[async_trait]
impl PipelineBehavior<Ping> for Trace {
    async fn handle(
        &self,
        _request: &Ping,
        _cancel: &CancellationToken,
        next: Next<'_, u64>,
    ) -> HandlerResult<u64> {
        self.recorder.push(format!("{}-before", self.name));
        let response = next().await;
        self.recorder.push(format!("{}-after", self.name));
        response
    }
}

/// Behavior that records "after" only when the rest of the chain succeeds.
pub(crate) struct Checked {
    name: &'static str,
    recorder: Recorder,
}

impl Checked {
    pub fn new(name: &'static str, recorder: Recorder) -> Self {
        Self { name, recorder }
    }
}

#[async_trait]
impl PipelineBehavior<Ping> for Checked {
    async fn handle(
        &self,
        _request: &Ping,
        _cancel: &CancellationToken,
        next: Next<'_, u64>,
    ) -> HandlerResult<u64> {
        self.recorder.push(format!("{}-before", self.name));
        let response = next().await?;
        self.recorder.push(format!("{}-after", self.name));
        Ok(response)
    }
}

/// Notification handler collecting what it observed.
#[derive(Clone, Default)]
pub(crate) struct Collect(Recorder);

impl Collect {
    pub fn seen(&self) -> Vec<String> {
        self.0.entries()
    }
}

#[async_trait]
impl NotificationHandler<Session> for Collect {
    async fn handle(&self, session: &Session, _cancel: &CancellationToken) -> HandlerResult<()> {
        self.0.push(format!("session:{}", session.user));
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler<dyn Audit> for Collect {
    async fn handle(
        &self,
        event: &(dyn Audit + 'static),
        _cancel: &CancellationToken,
    ) -> HandlerResult<()> {
        self.0.push(format!("audit:{}", event.actor()));
        Ok(())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Request echoing a number.
#[derive(Debug, Clone)]
pub(crate) struct Ping(pub u64);

impl Message for Ping {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn request_descriptor(&self) -> Option<RequestDescriptor> {
        Some(RequestDescriptor::of::<Self>())
    }
}

impl Request for Ping {
    type Response = u64;
}

/// Notification with no supertypes.
#[derive(Debug, Clone)]
pub(crate) struct Tick(pub u32);

impl Message for Tick {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn notification_descriptor(&self) -> Option<NotificationDescriptor> {
        Some(NotificationDescriptor::of::<Self>())
    }
}

impl Notification for Tick {}

/// Observable as an audit record.
pub(crate) trait Audit: Send + Sync {
    fn actor(&self) -> &str;
}

/// Parent notification.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub user: String,
}

impl Session {
    pub fn new(user: &str) -> Self {
        Self { user: user.into() }
    }
}

impl Message for Session {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn notification_descriptor(&self) -> Option<NotificationDescriptor> {
        Some(NotificationDescriptor::of::<Self>())
    }
}

impl Notification for Session {
    fn supertypes() -> Vec<Supertype<Self>> {
        vec![Supertype::of::<dyn Audit>()]
    }
}

impl Audit for Session {
    fn actor(&self) -> &str {
        &self.user
    }
}

impl Satisfies<dyn Audit> for Session {
    fn upcast(&self) -> &(dyn Audit + 'static) {
        self
    }
}

/// Child notification embedding a [`Session`].
#[derive(Debug, Clone)]
pub(crate) struct LoggedIn {
    pub session: Session,
}

impl LoggedIn {
    pub fn new(user: &str) -> Self {
        Self {
            session: Session::new(user),
        }
    }
}

impl Message for LoggedIn {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn notification_descriptor(&self) -> Option<NotificationDescriptor> {
        Some(NotificationDescriptor::of::<Self>())
    }
}

impl Audit for LoggedIn {
    fn actor(&self) -> &str {
        &self.session.user
    }
}

impl Satisfies<Session> for LoggedIn {
    fn upcast(&self) -> &Session {
        &self.session
    }
}

impl Satisfies<dyn Audit> for LoggedIn {
    fn upcast(&self) -> &(dyn Audit + 'static) {
        self
    }
}

impl Notification for LoggedIn {
    fn supertypes() -> Vec<Supertype<Self>> {
        let mut supertypes = vec![Supertype::of::<Session>(), Supertype::of::<dyn Audit>()];
        supertypes.extend(Session::supertypes().into_iter().map(Supertype::lift));
        supertypes
    }
}

/// A message that is neither request nor notification.
pub(crate) struct Plain;

impl Message for Plain {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A message claiming to be a [`Ping`].
pub(crate) struct Liar;

impl Message for Liar {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn request_descriptor(&self) -> Option<RequestDescriptor> {
        Some(RequestDescriptor::of::<Ping>())
    }
}
