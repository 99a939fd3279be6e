//! # turbonet-server
//!
//! Method+path dispatch for HTTP requests and WebSocket envelopes, driven by
//! a poll loop over any [`Transport`](turbonet_transport_traits::Transport).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turbonet_server::{Dispatcher, Server, ServerConfig};
//! use turbonet_transport_traits::Transport;
//!
//! # async fn example(transport: Arc<dyn Transport>) -> turbonet_core::NetResult<()> {
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on_http("GET", "/hello-world", |ctx, _| {
//!     ctx.send_status(200, "hello world");
//! })?;
//! dispatcher.on_ws("POST", "hello-world", |ctx, envelope, _| {
//!     let _ = ctx.send(&serde_json::json!({ "id": envelope.id, "text": "hello world" }));
//! })?;
//!
//! let server = Server::new(transport, ServerConfig::default(), dispatcher).start();
//! // ...
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dispatcher`]: routing of events onto handlers
//! - [`context`]: what handlers read from and write to
//! - [`server`]: the poll loop and its handles
//! - [`config`] / [`logging`]: configuration loading and tracing setup

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod logging;
pub mod server;

pub use config::{ConfigurationBuilder, LogOutput, LogRotation, LoggingConfig, ServerConfig};
pub use context::{HttpContext, Outbound, WsContext};
pub use dispatcher::{
    ApiCall, ApiKind, ApiObserver, CloseHook, Dispatcher, HttpHandler, WsHandler,
};
pub use logging::LoggingGuard;
pub use server::{RunningServer, SentHook, Server, ServerHandle};

/// Server name used when none is configured
pub const SERVER_NAME: &str = "turbonet-server";

/// Crate version
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
