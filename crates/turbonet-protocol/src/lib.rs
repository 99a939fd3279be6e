//! # turbonet-protocol
//!
//! Message shapes exchanged between the event loop, the dispatcher and the
//! clients:
//!
//! - [`HttpRequest`] / [`HttpResponse`] with [`Headers`] and a parsed [`Target`]
//! - [`Envelope`], the JSON object carried by every WebSocket text frame
//!
//! Wire-level HTTP parsing and WebSocket framing are the transport's job;
//! this crate only models what comes out of it.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod envelope;
pub mod http;
pub mod method;
pub mod target;

pub use envelope::Envelope;
pub use http::{APPLICATION_JSON, Headers, HttpRequest, HttpResponse};
pub use method::Method;
pub use target::Target;
