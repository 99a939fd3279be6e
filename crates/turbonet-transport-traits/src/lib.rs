//! # turbonet-transport-traits
//!
//! The contract between turbonet and the non-blocking event loop that owns
//! the sockets. Implementations live in their own crates; the server and
//! the clients depend only on this one.
//!
//! ## Contents
//!
//! - [`Transport`]: connect, bind, send, poll, close
//! - [`TransportEvent`] and [`Frame`]: what comes in and what goes out
//! - [`ConnectionHandle`], [`Endpoint`], [`TransportType`]
//! - [`TransportError`] with conversion into [`turbonet_core::NetError`]
//! - [`LimitsConfig`], [`TimeoutConfig`] and [`validate_frame_size`]

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use config::{LimitsConfig, TimeoutConfig};
pub use error::{TransportError, TransportResult, validate_frame_size};
pub use events::{Frame, TransportEvent};
pub use traits::Transport;
pub use types::{ConnectionHandle, Endpoint, TransportType};
