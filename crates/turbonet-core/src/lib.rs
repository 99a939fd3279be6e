//! # turbonet-core
//!
//! Foundation layer of the turbonet toolkit:
//!
//! - [`NetError`] / [`ErrorKind`]: the single error type shared by every crate
//! - [`Router`]: the method+path trie that multiplexes HTTP requests and
//!   WebSocket envelopes onto handlers
//! - [`Params`]: parameters captured during resolution
//! - [`load_file`]: configuration file loading with environment overrides
//!
//! The router is generic over the handler type so the server and both clients
//! can store their own callback signatures in it.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod router;

pub use crate::config::{ConfigError, ENV_PREFIX, load_file};
pub use error::{ErrorContext, ErrorKind, NetError, NetResult};
pub use router::{NodeKind, Params, RouteMatch, Router, concat};
