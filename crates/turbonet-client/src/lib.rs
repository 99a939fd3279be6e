//! # turbonet-client
//!
//! Clients for turbonet endpoints.
//!
//! - [`Session`]: one logical connection with a FIFO request queue, a single
//!   in-flight slot, reply correlation and a reconnection policy
//! - [`HttpClient`]: a session bound to an `http` base URL
//! - [`WsClient`]: a WebSocket client routing incoming envelopes onto
//!   handlers
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turbonet_client::HttpClient;
//! use turbonet_protocol::HttpRequest;
//! use turbonet_transport_traits::Transport;
//!
//! # async fn example(transport: Arc<dyn Transport>) -> turbonet_core::NetResult<()> {
//! let reply = HttpClient::fetch(transport, "http://127.0.0.1:8080", HttpRequest::get("/hello-world")).await?;
//! assert_eq!(reply.body_text(), Some("hello world"));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod http;
pub mod session;
pub mod ws;

pub use config::{ReconnectConfig, SessionConfig, SessionConfigBuilder, WsClientConfig};
pub use connection::ConnectionState;
pub use http::HttpClient;
pub use session::{ReplyCallback, Session};
pub use ws::{WsClient, WsClientBuilder, WsClientHandler};
