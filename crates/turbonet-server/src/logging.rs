//! Logging initialization for turbonet processes
//!
//! ```rust,no_run
//! use turbonet_server::LoggingConfig;
//!
//! // Stderr-only (no guard needed)
//! LoggingConfig::stderr_minimal().init()?;
//!
//! // File logging (guard must be held)
//! let _guard = LoggingConfig::file("/var/log/turbonet").init()?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! | Output Target | Guard Required |
//! |---------------|----------------|
//! | `Stderr` | No |
//! | `FileOnly` | **Yes** |
//! | `Both` | **Yes** |
//! | `None` | No |
//!
//! Dropping the guard early may lose buffered log lines.

use crate::config::{LogOutput, LogRotation, LoggingConfig};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Guard that flushes file logs on drop; hold it for the life of the process.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: Option<WorkerGuard>,
}

impl LoggingConfig {
    /// Initialize logging based on this configuration
    ///
    /// Returns `Some(LoggingGuard)` for file-based logging (must be held),
    /// or `None` for stderr-only logging.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File logging is configured without a directory, or creating it fails
    /// - A global tracing subscriber is already installed
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                init_stderr(self, filter)?;
                Ok(None)
            }
            LogOutput::FileOnly => {
                let dir = self.require_directory()?;
                init_file(self, dir, filter, false).map(Some)
            }
            LogOutput::Both => {
                let dir = self.require_directory()?;
                init_file(self, dir, filter, true).map(Some)
            }
        }
    }

    fn require_directory(&self) -> io::Result<&Path> {
        self.directory.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "File logging requires a directory (set `directory` or use LoggingConfig::file())",
            )
        })
    }
}

fn appender(config: &LoggingConfig, dir: &Path) -> RollingFileAppender {
    match config.rotation {
        LogRotation::Minute => tracing_appender::rolling::minutely(dir, &config.file_prefix),
        LogRotation::Hourly => tracing_appender::rolling::hourly(dir, &config.file_prefix),
        LogRotation::Daily => tracing_appender::rolling::daily(dir, &config.file_prefix),
        LogRotation::Never => tracing_appender::rolling::never(dir, &config.file_prefix),
    }
}

fn init_stderr(config: &LoggingConfig, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

fn init_file(
    config: &LoggingConfig,
    dir: &Path,
    filter: EnvFilter,
    with_stderr: bool,
) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender(config, dir));
    let subscriber = tracing_subscriber::registry().with(filter);

    if with_stderr {
        let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(io::stderr());
        let combined = file_writer.and(stderr_writer);
        if config.structured {
            subscriber
                .with(fmt::layer().json().with_writer(combined))
                .try_init()
        } else {
            subscriber.with(fmt::layer().with_writer(combined)).try_init()
        }
        .map_err(|e| io::Error::other(e.to_string()))?;

        return Ok(LoggingGuard {
            _file_guard: file_guard,
            _stderr_guard: Some(stderr_guard),
        });
    }

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(file_writer))
            .try_init()
    } else {
        subscriber.with(fmt::layer().with_writer(file_writer)).try_init()
    }
    .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _stderr_guard: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_only_requires_directory() {
        let config = LoggingConfig {
            output: LogOutput::FileOnly,
            directory: None,
            ..LoggingConfig::default()
        };
        let err = config.init().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_disabled_output_installs_nothing() {
        let config = LoggingConfig {
            output: LogOutput::None,
            ..LoggingConfig::default()
        };
        assert!(config.init().unwrap().is_none());
    }

    #[test]
    fn test_log_rotation_default() {
        assert_eq!(LogRotation::default(), LogRotation::Never);
        assert_eq!(LogOutput::default(), LogOutput::Stderr);
    }
}
