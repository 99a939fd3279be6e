//! Unified turbonet error handling.
//!
//! Every crate in the workspace reports failures through [`NetError`]. The
//! [`ErrorKind`] classifies the failure so callers can react programmatically:
//!
//! | Kind | Raised by | Typical handling |
//! |------|-----------|------------------|
//! | `Configuration` | route registration, config loading | fatal at startup |
//! | `RouteNotFound` | [`Router::resolve`](crate::Router::resolve) | fallback / 404 |
//! | `MalformedEnvelope` | envelope parsing | message dropped |
//! | `ConnectionLost` | client session | request failed, maybe reconnect |
//! | `TimedOut` | blocking send, disconnect | request abandoned |
//!
//! ## Example
//!
//! ```rust
//! use turbonet_core::{ErrorKind, NetError, NetResult};
//!
//! fn lookup() -> NetResult<()> {
//!     Err(NetError::route_not_found("/missing/GET"))
//! }
//!
//! assert_eq!(lookup().unwrap_err().kind, ErrorKind::RouteNotFound);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for turbonet operations
pub type NetResult<T> = std::result::Result<T, NetError>;

/// Unified turbonet error type
///
/// The `context` field is boxed to keep `Result<T, NetError>` small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Additional error context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation being performed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Component where error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// Error classification for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // === Routing ===
    /// Invalid route pattern or configuration; fatal at startup
    Configuration,
    /// No registered route matched the dispatch key
    RouteNotFound,
    /// WebSocket envelope is not an object or lacks required discriminators
    MalformedEnvelope,

    // === Connection lifecycle ===
    /// The connection dropped (or was never up) while a request was pending
    ConnectionLost,
    /// Connection establishment was refused or failed
    ConnectionFailed,
    /// A bounded wait expired
    TimedOut,
    /// Operation cancelled before completion
    Cancelled,

    // === General ===
    /// Transport/event loop error
    Transport,
    /// Invalid request shape
    InvalidRequest,
    /// Serialization error
    Serialization,
    /// Internal error
    Internal,
}

impl NetError {
    /// Create a new error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a route not found error
    #[must_use]
    pub fn route_not_found(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(ErrorKind::RouteNotFound, format!("Route not found: {}", key))
            .with_operation("route_lookup")
            .with_component("router")
    }

    /// Create a malformed envelope error
    #[must_use]
    pub fn malformed_envelope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedEnvelope, message)
    }

    /// Create a connection lost error
    #[must_use]
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionLost, message)
    }

    /// Create a connection failed error
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    /// Create a timeout error
    #[must_use]
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimedOut, message)
    }

    /// Create a cancelled error
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Set the operation context
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        let ctx = self
            .context
            .get_or_insert_with(|| Box::new(ErrorContext::default()));
        ctx.operation = Some(operation.into());
        self
    }

    /// Set the component context
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        let ctx = self
            .context
            .get_or_insert_with(|| Box::new(ErrorContext::default()));
        ctx.component = Some(component.into());
        self
    }

    /// Check if the failed operation may succeed when retried on a fresh connection
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConnectionLost
                | ErrorKind::ConnectionFailed
                | ErrorKind::TimedOut
                | ErrorKind::Transport
        )
    }

    /// Get the HTTP status code a server would answer with for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind {
            ErrorKind::MalformedEnvelope | ErrorKind::InvalidRequest => 400,
            ErrorKind::RouteNotFound => 404,
            ErrorKind::TimedOut => 408,
            ErrorKind::Cancelled => 499,
            ErrorKind::Configuration | ErrorKind::Serialization | ErrorKind::Internal => 500,
            ErrorKind::ConnectionLost | ErrorKind::ConnectionFailed | ErrorKind::Transport => 503,
        }
    }
}

impl ErrorKind {
    /// Get a human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::RouteNotFound => "Route not found",
            Self::MalformedEnvelope => "Malformed envelope",
            Self::ConnectionLost => "Connection lost",
            Self::ConnectionFailed => "Connection failed",
            Self::TimedOut => "Operation timed out",
            Self::Cancelled => "Operation cancelled",
            Self::Transport => "Transport error",
            Self::InvalidRequest => "Invalid request",
            Self::Serialization => "Serialization error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(op) = &ctx.operation {
                write!(f, " (operation: {})", op)?;
            }
            if let Some(comp) = &ctx.component {
                write!(f, " (component: {})", comp)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for NetError {}

// =========================================================================
// From implementations for common error types
// =========================================================================

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_syntax() || err.is_eof() || err.is_data() {
            ErrorKind::MalformedEnvelope
        } else {
            ErrorKind::Serialization
        };
        Self::new(kind, format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let kind = match err.kind() {
            IoKind::ConnectionRefused => ErrorKind::ConnectionFailed,
            IoKind::ConnectionReset
            | IoKind::ConnectionAborted
            | IoKind::NotConnected
            | IoKind::BrokenPipe
            | IoKind::UnexpectedEof => ErrorKind::ConnectionLost,
            IoKind::TimedOut => ErrorKind::TimedOut,
            _ => ErrorKind::Transport,
        };
        Self::new(kind, format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = NetError::configuration("duplicate parameter");
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(err.message.contains("duplicate parameter"));
        assert!(err.context.is_none());
    }

    #[test]
    fn test_error_context() {
        let err = NetError::internal("boom")
            .with_operation("dispatch")
            .with_component("server");

        let ctx = err.context.clone().unwrap();
        assert_eq!(ctx.operation.as_deref(), Some("dispatch"));
        assert_eq!(ctx.component.as_deref(), Some("server"));
        assert_eq!(err.to_string(), "boom (operation: dispatch) (component: server)");
    }

    #[test]
    fn test_route_not_found_carries_key() {
        let err = NetError::route_not_found("/hello/GET");
        assert_eq!(err.kind, ErrorKind::RouteNotFound);
        assert!(err.message.contains("/hello/GET"));
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(NetError::connection_lost("x").is_retryable());
        assert!(NetError::timed_out("x").is_retryable());
        assert!(!NetError::configuration("x").is_retryable());
        assert!(!NetError::malformed_envelope("x").is_retryable());
    }

    #[test]
    fn test_io_error_mapping() {
        let err: NetError = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert_eq!(err.kind, ErrorKind::ConnectionLost);

        let err: NetError = std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        assert_eq!(err.kind, ErrorKind::ConnectionFailed);

        let err: NetError = std::io::Error::from(std::io::ErrorKind::TimedOut).into();
        assert_eq!(err.kind, ErrorKind::TimedOut);
    }

    #[test]
    fn test_json_error_mapping() {
        let err: NetError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind, ErrorKind::MalformedEnvelope);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ConnectionLost.to_string(), "Connection lost");
        assert_eq!(ErrorKind::RouteNotFound.to_string(), "Route not found");
    }
}
