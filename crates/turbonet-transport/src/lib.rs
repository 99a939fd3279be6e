//! # turbonet-transport
//!
//! Transport implementations for turbonet.
//!
//! [`MemoryTransport`] is an in-process event loop: listeners and clients in
//! the same process exchange parsed HTTP requests, responses and WebSocket
//! frames through per-handle event queues. It is the transport the test
//! suites and the demo run on, and a reference for socket-backed
//! implementations of [`Transport`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod memory;

pub use memory::{CLOSED_BY_PEER, CONNECTION_REFUSED, MemoryTransport};
pub use turbonet_transport_traits::{
    ConnectionHandle, Endpoint, Frame, LimitsConfig, TimeoutConfig, Transport, TransportError,
    TransportEvent, TransportResult, TransportType,
};
