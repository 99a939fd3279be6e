//! Configuration file loading shared by server and client configs.
//!
//! Files are TOML, YAML or JSON, chosen by extension. Environment variables
//! with the given prefix override file settings; nested keys use `__`
//! (e.g. `TURBONET_LOGGING__LEVEL=debug`).

use crate::error::NetError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "TURBONET";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ConfigError> for NetError {
    fn from(err: ConfigError) -> Self {
        NetError::configuration(err.to_string()).with_component("config")
    }
}

/// Load `T` from a file, with `env_prefix`-ed environment overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file is missing, has an unknown extension,
/// or does not deserialize into `T`.
pub fn load_file<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    env_prefix: &str,
) -> Result<T, ConfigError> {
    use config::{Config, Environment, File, FileFormat};

    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let format = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => return Err(ConfigError::UnsupportedFormat),
    };

    let config = Config::builder()
        .add_source(File::new(
            path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
            format,
        ))
        // Environment variables override file settings
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[derive(Debug, serde::Deserialize)]
    struct Sample {
        #[allow(dead_code)]
        name: String,
    }

    #[test]
    fn test_missing_file() {
        let err = load_file::<Sample>("/definitely/not/here.toml", ENV_PREFIX).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));

        let net: NetError = err.into();
        assert_eq!(net.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_unsupported_extension() {
        // The file exists; only its extension is rejected
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/lib.rs");
        let err = load_file::<Sample>(path, ENV_PREFIX).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat));
    }
}
