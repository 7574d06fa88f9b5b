//! Error types for disconf-sync.

use std::path::PathBuf;

use thiserror::Error;

use disconf_core::ConfigError;

/// Failures of the HTTP fetch layer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, or body read failure for one attempt.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Every endpoint and retry was used up.
    #[error("http request failed on every endpoint after {attempts} attempts: {path}")]
    ExhaustedEndpoints { path: String, attempts: usize },

    #[error("blocking request task failed: {0}")]
    Join(String),
}

/// Failures reported by the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error("node does not exist: {0}")]
    NoNode(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("coordination session expired")]
    SessionExpired,

    #[error("coordination error: {0}")]
    Other(String),
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A remote payload did not have the expected shape.
    #[error("unexpected payload for {key}: {reason}")]
    Payload { key: String, reason: String },

    /// A failure reported by the node watching `key`.
    #[error("{key}: {source}")]
    Node {
        key: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
