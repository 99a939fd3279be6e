//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use turbonet_core::{ConfigError, ENV_PREFIX, load_file};
use turbonet_transport_traits::TimeoutConfig;

/// Automatic reconnection after an unexpected close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection
    pub enabled: bool,

    /// Fixed delay before each attempt
    pub backoff: Duration,

    /// Maximum number of attempts per outage.
    /// `None` = keep trying until `disconnect()`
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backoff: Duration::from_secs(1),
            max_attempts: Some(10),
        }
    }
}

impl ReconnectConfig {
    /// Reconnection turned off
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            backoff: Duration::from_secs(1),
            max_attempts: Some(0),
        }
    }

    /// Reconnect after `backoff`, at most `max_attempts` times
    #[must_use]
    pub const fn fixed(backoff: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            enabled: true,
            backoff,
            max_attempts,
        }
    }

    /// Whether attempt number `attempt` (1-based) is allowed
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// Configuration for a request/reply [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Connect, request and disconnect timeouts
    pub timeouts: TimeoutConfig,

    /// How long one transport poll may wait for an event
    pub poll_interval: Duration,

    /// Connect on `send` when not connected instead of failing
    pub connect_on_send: bool,

    /// Reconnection policy
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            poll_interval: Duration::from_millis(50),
            connect_on_send: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables prefixed with `TURBONET_` override file
    /// settings (e.g. `TURBONET_RECONNECT__ENABLED=true`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unsupported
    /// extension, or fails to parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_file(path, ENV_PREFIX)
    }

    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the connection establishment timeout
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.connect = timeout;
        self
    }

    /// Set the default request timeout (`None` waits until the connection drops)
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    /// Set the teardown timeout
    #[must_use]
    pub const fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.disconnect = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Connect on send when disconnected
    #[must_use]
    pub const fn connect_on_send(mut self, enabled: bool) -> Self {
        self.config.connect_on_send = enabled;
        self
    }

    /// Set the reconnection policy
    #[must_use]
    pub const fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Build configuration
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Configuration for a [`WsClient`](crate::WsClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsClientConfig {
    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// Teardown timeout
    pub disconnect_timeout: Duration,

    /// How long one transport poll may wait for an event
    pub poll_interval: Duration,

    /// Reconnection policy
    pub reconnect: ReconnectConfig,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            connect_timeout: timeouts.connect,
            disconnect_timeout: timeouts.disconnect,
            poll_interval: Duration::from_millis(50),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl WsClientConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// # Errors
    ///
    /// Same as [`SessionConfig::from_file`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_file(path, ENV_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert!(config.connect_on_send);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.timeouts, TimeoutConfig::default());
    }

    #[test]
    fn test_session_builder() {
        let config = SessionConfig::builder()
            .connect_timeout(Duration::from_millis(100))
            .request_timeout(None)
            .disconnect_timeout(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(5))
            .connect_on_send(false)
            .reconnect(ReconnectConfig::fixed(Duration::from_millis(10), Some(3)))
            .build();

        assert_eq!(config.timeouts.connect, Duration::from_millis(100));
        assert_eq!(config.timeouts.request, None);
        assert_eq!(config.timeouts.disconnect, Duration::from_millis(200));
        assert!(!config.connect_on_send);
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_reconnect_allows() {
        let bounded = ReconnectConfig::fixed(Duration::ZERO, Some(2));
        assert!(bounded.allows(1));
        assert!(bounded.allows(2));
        assert!(!bounded.allows(3));

        let unbounded = ReconnectConfig::fixed(Duration::ZERO, None);
        assert!(unbounded.allows(1_000));

        assert!(!ReconnectConfig::disabled().allows(1));
    }

    #[test]
    fn test_session_config_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "connect_on_send: false\nreconnect:\n  enabled: true\n  max_attempts: 4"
        )
        .unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert!(!config.connect_on_send);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, Some(4));
        assert_eq!(config.reconnect.backoff, ReconnectConfig::default().backoff);
    }

    #[test]
    fn test_ws_config_from_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"reconnect": {{"enabled": true, "max_attempts": null}}}}"#).unwrap();

        let config = WsClientConfig::from_file(file.path()).unwrap();
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.poll_interval, WsClientConfig::default().poll_interval);
    }
}
