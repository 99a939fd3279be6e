//! Transport configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for frame size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size in bytes of a single outbound frame body.
    /// `None` = unlimited
    pub max_frame_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: Some(16 * 1024 * 1024), // 16MB
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_size: None,
        }
    }

    /// Create a configuration with strict limits for untrusted peers.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_frame_size: Some(256 * 1024), // 256KB
        }
    }
}

/// Configuration for connection timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect: Duration,

    /// Single request timeout.
    /// `None` = wait for the reply or the connection to drop
    pub request: Option<Duration>,

    /// Upper bound on tearing a connection down.
    pub disconnect: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Some(Duration::from_secs(60)),
            disconnect: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    /// Create a configuration with short timeouts for fast operations.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Some(Duration::from_secs(10)),
            disconnect: Duration::from_secs(1),
        }
    }

    /// Create a configuration with no request timeout.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: None,
            disconnect: Duration::from_secs(5),
        }
    }

    /// Create a configuration with long timeouts for slow peers.
    #[must_use]
    pub const fn patient() -> Self {
        Self {
            connect: Duration::from_secs(60),
            request: Some(Duration::from_secs(300)), // 5 minutes
            disconnect: Duration::from_secs(30),
        }
    }
}
