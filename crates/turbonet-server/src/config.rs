//! Server configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use turbonet_core::{ConfigError, ENV_PREFIX, load_file};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name, used in logs
    pub name: String,
    /// Bind address
    pub bind_address: String,
    /// Bind port
    pub port: u16,
    /// How long one transport poll may wait for an event
    pub poll_interval: Duration,
    /// Upper bound on waiting for the poll loop to exit on stop
    pub stop_timeout: Duration,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Logging disabled
    None,
    /// Standard error only
    #[default]
    Stderr,
    /// Rolling file only
    FileOnly,
    /// Standard error and rolling file
    Both,
}

/// Log file rotation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    /// New file every minute
    Minute,
    /// New file every hour
    Hourly,
    /// New file every day
    Daily,
    /// Single file
    #[default]
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Enable structured (JSON) logging
    pub structured: bool,
    /// Output target
    pub output: LogOutput,
    /// Directory for log files
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
    /// Log file rotation
    pub rotation: LogRotation,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: crate::SERVER_NAME.to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            poll_interval: Duration::from_millis(50),
            stop_timeout: Duration::from_secs(5),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension. Environment
    /// variables prefixed with `TURBONET_` override file settings, using `__`
    /// for nested keys (e.g. `TURBONET_LOGGING__LEVEL=debug`).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use turbonet_server::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("config.toml")?;
    /// # Ok::<(), turbonet_core::ConfigError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unsupported
    /// extension, or fails to parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`ServerConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        load_file(path, env_prefix)
    }

    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Endpoint URL the server binds
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.bind_address, self.port)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
            directory: None,
            file_prefix: "turbonet".to_string(),
            rotation: LogRotation::Never,
        }
    }
}

impl LoggingConfig {
    /// Errors only, to stderr
    #[must_use]
    pub fn stderr_minimal() -> Self {
        Self {
            level: "error".to_string(),
            ..Self::default()
        }
    }

    /// Debug level, to stderr
    #[must_use]
    pub fn stderr_debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Info level to a single file in `directory`
    #[must_use]
    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self {
            output: LogOutput::FileOnly,
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    /// Structured logs to stderr and an hourly rolling file in `directory`
    #[must_use]
    pub fn production(directory: impl Into<PathBuf>) -> Self {
        Self {
            level: "info".to_string(),
            structured: true,
            output: LogOutput::Both,
            directory: Some(directory.into()),
            file_prefix: "turbonet".to_string(),
            rotation: LogRotation::Hourly,
        }
    }
}

/// Configuration builder
#[derive(Debug)]
pub struct ConfigurationBuilder {
    config: ServerConfig,
}

impl ConfigurationBuilder {
    /// Create a new configuration builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Set server name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set bind address
    #[must_use]
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// Set port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set stop timeout
    #[must_use]
    pub const fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Set log level
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Replace the logging configuration
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build configuration
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.name, crate::SERVER_NAME);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.endpoint(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .name("test-server")
            .bind_address("0.0.0.0")
            .port(9000)
            .poll_interval(Duration::from_millis(5))
            .stop_timeout(Duration::from_secs(1))
            .log_level("debug")
            .build();

        assert_eq!(config.name, "test-server");
        assert_eq!(config.endpoint(), "http://0.0.0.0:9000");
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.stop_timeout, Duration::from_secs(1));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_from_toml_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "name = \"from-file\"\nport = 9100\n\n[logging]\nlevel = \"warn\"\noutput = \"both\"\nrotation = \"daily\""
        )
        .unwrap();

        let config = ServerConfig::from_file_with_prefix(file.path(), "TURBONET_TEST_TOML").unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.output, LogOutput::Both);
        assert_eq!(config.logging.rotation, LogRotation::Daily);
        assert_eq!(config.poll_interval, ServerConfig::default().poll_interval);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"bind_address": "10.0.0.1", "port": 81}}"#).unwrap();

        let config = ServerConfig::from_file_with_prefix(file.path(), "TURBONET_TEST_JSON").unwrap();
        assert_eq!(config.endpoint(), "http://10.0.0.1:81");
    }

    #[test]
    fn test_from_file_unsupported_format() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat));
    }

    #[test]
    fn test_logging_presets() {
        let config = LoggingConfig::stderr_minimal();
        assert_eq!(config.level, "error");
        assert_eq!(config.output, LogOutput::Stderr);

        let config = LoggingConfig::file("/var/log/test");
        assert_eq!(config.output, LogOutput::FileOnly);
        assert!(config.directory.is_some());

        let config = LoggingConfig::production("/var/log/prod");
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(config.rotation, LogRotation::Hourly);
        assert!(config.structured);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn test_config_port_roundtrip(port in 1024u16..65535u16) {
                let config = ServerConfig::builder().port(port).build();
                prop_assert_eq!(config.port, port);
                let suffix = format!(":{}", port);
                prop_assert!(config.endpoint().ends_with(&suffix));
            }

            #[test]
            fn test_config_name_preservation(name in "[a-zA-Z0-9_-]{1,50}") {
                let config = ServerConfig::builder().name(name.clone()).build();
                prop_assert_eq!(config.name, name);
            }
        }
    }
}
