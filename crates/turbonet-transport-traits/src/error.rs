//! Transport error types.

use thiserror::Error;
use turbonet_core::{ErrorKind, NetError};

use crate::config::LimitsConfig;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The handle does not name a live connection or listener.
    #[error("Unknown connection handle: {0}")]
    UnknownHandle(u64),

    /// Failed to send a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to bind a listener.
    #[error("Bind failed: {0}")]
    BindFailed(String),

    /// The endpoint could not be parsed or is unsupported.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The operation did not complete within the specified timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Frame size exceeds the configured maximum limit.
    #[error(
        "Frame size ({size} bytes) exceeds maximum allowed ({max} bytes). \
         If this is expected, increase the limit with \
         `LimitsConfig {{ max_frame_size: Some({}) }}`",
        size
    )]
    FrameTooLarge {
        /// The actual size of the frame in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SendFailed(format!("Serialization failed: {}", err))
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

// =========================================================================
// Integration with the unified NetError
// =========================================================================

impl From<TransportError> for NetError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            TransportError::ConnectionLost(_)
            | TransportError::UnknownHandle(_)
            | TransportError::SendFailed(_)
            | TransportError::Io(_) => ErrorKind::ConnectionLost,
            TransportError::Timeout => ErrorKind::TimedOut,
            TransportError::BindFailed(_)
            | TransportError::InvalidEndpoint(_)
            | TransportError::ConfigurationError(_) => ErrorKind::Configuration,
            TransportError::FrameTooLarge { .. } => ErrorKind::InvalidRequest,
            TransportError::Internal(_) => ErrorKind::Transport,
        };

        NetError::new(kind, err.to_string()).with_component("transport")
    }
}

/// Validates that a frame does not exceed the configured limit.
///
/// `Ok(())` if the size is within limits or no limit is set.
pub fn validate_frame_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max) = limits.max_frame_size
        && size > max
    {
        return Err(TransportError::FrameTooLarge { size, max });
    }
    Ok(())
}
