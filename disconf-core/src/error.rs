//! Error types for disconf-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bootstrap file exists but could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An option value could not be converted to its typed form.
    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },

    /// A required option is empty or absent.
    #[error("required option '{0}' is not set")]
    Missing(&'static str),

    /// A registry response did not carry a field the client depends on.
    #[error("response from {path} is missing field '{field}'")]
    MissingField { path: String, field: &'static str },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
