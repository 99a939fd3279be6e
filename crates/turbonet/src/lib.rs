//! # turbonet
//!
//! Method+path routing for HTTP requests and WebSocket envelopes, and client
//! sessions with queued, correlated request/reply exchange.
//!
//! This crate re-exports the workspace crates behind one dependency:
//!
//! | Crate | Contents |
//! |-------|----------|
//! | [`turbonet_core`] | `NetError`, the route trie, `Params`, config loading |
//! | [`turbonet_protocol`] | HTTP request/response shapes, the WebSocket `Envelope` |
//! | [`turbonet_transport`] | The `Transport` contract and the in-process `MemoryTransport` |
//! | [`turbonet_server`] | `Dispatcher`, `Server`, logging setup |
//! | [`turbonet_client`] | `Session`, `HttpClient`, `WsClient` |
//!
//! ## Hello world
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turbonet::prelude::*;
//!
//! # async fn example() -> NetResult<()> {
//! let transport = Arc::new(MemoryTransport::new());
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on_http("GET", "/hello-world", |ctx, _| {
//!     ctx.send_status(200, "hello world");
//! })?;
//! let server = Server::new(transport.clone(), ServerConfig::default(), dispatcher).start();
//!
//! let reply = HttpClient::fetch(transport, "http://127.0.0.1:8080", HttpRequest::get("/hello-world")).await?;
//! assert_eq!(reply.body_text(), Some("hello world"));
//!
//! server.stop().await?;
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

pub use turbonet_client;
pub use turbonet_core;
pub use turbonet_protocol;
pub use turbonet_server;
pub use turbonet_transport;

pub use async_trait::async_trait;
pub use serde_json;
pub use tokio;
pub use tracing;

pub use turbonet_core::{ErrorKind, NetError, NetResult, Params, Router};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to register routes, run a server and talk to it
pub mod prelude {
    pub use turbonet_core::{ErrorKind, NetError, NetResult, Params, Router, concat};
    pub use turbonet_protocol::{Envelope, Headers, HttpRequest, HttpResponse, Method};

    pub use turbonet_transport::{
        ConnectionHandle, Endpoint, Frame, MemoryTransport, Transport, TransportEvent,
    };

    pub use turbonet_server::{
        Dispatcher, HttpContext, LoggingConfig, RunningServer, Server, ServerConfig, ServerHandle,
        WsContext,
    };

    pub use turbonet_client::{
        ConnectionState, HttpClient, ReconnectConfig, Session, SessionConfig, WsClient,
        WsClientConfig,
    };

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}
