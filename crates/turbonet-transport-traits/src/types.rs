//! Core transport types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransportError;

/// Enumerates the kinds of event loop behind a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// In-process loopback, used for tests and embedding.
    Memory,
    /// HTTP over TCP.
    Http,
    /// WebSocket over TCP.
    WebSocket,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Http => write!(f, "http"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Opaque handle naming one connection or listener inside a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated `http`, `https`, `ws` or `wss` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse and validate an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] for unparsable URLs,
    /// unsupported schemes, or URLs without a host.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme '{}' in '{}'",
                    other, raw
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint(format!(
                "missing host in '{}'",
                raw
            )));
        }
        Ok(Self { url })
    }

    /// URL scheme
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Whether this endpoint upgrades to a WebSocket
    #[must_use]
    pub fn is_websocket(&self) -> bool {
        matches!(self.url.scheme(), "ws" | "wss")
    }

    /// Whether the scheme requires TLS
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(self.url.scheme(), "https" | "wss")
    }

    /// Host name
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port, falling back to the scheme default
    #[must_use]
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// `host:port`, the key listeners are bound under
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// Value for the `Host` request header
    #[must_use]
    pub fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Path (and query) to request on this endpoint
    #[must_use]
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
