//! Foundation layer: message contracts, type identity and errors.

pub mod error;
pub mod message;
pub mod type_key;

pub use error::{BoxError, DispatchError, DispatchResult, HandlerResult};
pub use message::{BoxedMessage, Message, Notification, Request, Satisfies, Unit};
pub use type_key::TypeKey;
