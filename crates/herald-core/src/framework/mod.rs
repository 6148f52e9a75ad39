//! Framework layer: adapters, pipeline composition, fan-out and the mediator.

pub mod cache;
pub mod fanout;
pub mod handler;
pub mod mediator;
pub mod notification;
pub mod pipeline;
pub mod request;
pub mod service;

pub use cache::WrapperCache;
pub use fanout::{FailurePolicy, fan_out};
pub use handler::{
    NotificationFn, NotificationHandler, RequestFn, RequestHandler, notification_fn, request_fn,
};
pub use mediator::{Mediator, MediatorBuilder};
pub use notification::{
    NotificationAdapter, NotificationDescriptor, NotificationDispatch, Observer, Supertype,
};
pub use pipeline::{AnyResponse, ClosedBehavior, Next, OpenBehavior, PipelineBehavior, compose};
pub use request::{RequestAdapter, RequestDescriptor, RequestDispatch};
pub use service::MediatorService;
