//! Derive macros for Herald messages.
//!
//! - `#[derive(Request)]` implements `Message` and `Request`
//! - `#[derive(Notification)]` implements `Message`, `Notification` and the
//!   `Satisfies` views of its declared supertypes
//!
//! Generated code refers to the `herald` facade crate.
//!
//! ```rust,ignore
//! use herald::{Notification, Request};
//!
//! #[derive(Clone, Request)]
//! #[request(response = u64)]
//! pub struct GetBalance {
//!     pub account: String,
//! }
//!
//! #[derive(Clone, Notification)]
//! #[notification(observe_as(dyn AuditEvent))]
//! pub struct Deposited {
//!     #[notification(parent)]
//!     pub movement: BalanceChanged,
//!     pub amount: u64,
//! }
//! ```

mod message;
mod notification;
mod request;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Message` and `Request`.
///
/// # Attributes
///
/// - `#[request(response = Type)]` - The response type (default: `herald::Unit`)
/// - `#[request(name = "...")]` - Override the message name used in logs and errors
#[proc_macro_derive(Request, attributes(request))]
pub fn derive_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match request::derive_request(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `Message` and `Notification`.
///
/// # Attributes
///
/// - `#[notification(observe_as(dyn Trait, ...))]` - Trait objects this
///   notification can be observed as. The type must implement each trait.
/// - `#[notification(name = "...")]` - Override the message name
/// - `#[notification(parent)]` on a field - The field is a parent notification;
///   handlers of the parent and of all its supertypes observe this one too.
#[proc_macro_derive(Notification, attributes(notification))]
pub fn derive_notification(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match notification::derive_notification(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
