//! Seam to the watch-capable coordination service.
//!
//! Watches are one-shot: a [`DataWatch`] resolves at most once and has to be
//! re-armed by another [`Coordinator::get_data_watch`] call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::CoordinationError;

/// Session parameters handed to a [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub session_timeout: Duration,
    pub spin_delay: Duration,
    pub retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(10),
            spin_delay: Duration::from_secs(2),
            retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    /// Removed when the session ends; the store appends a sequence suffix.
    EphemeralSequential,
}

/// What woke a data watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    DataChanged { path: String },
    Deleted { path: String },
    SessionExpired,
}

impl std::fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchEvent::DataChanged { path } => write!(f, "data changed at {path}"),
            WatchEvent::Deleted { path } => write!(f, "deleted {path}"),
            WatchEvent::SessionExpired => f.write_str("session expired"),
        }
    }
}

pub type DataWatch = oneshot::Receiver<WatchEvent>;

/// Operations the sync engine needs from an open session.
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    async fn exists(&self, path: &str) -> Result<bool, CoordinationError>;

    /// Create `path` and any missing ancestors as persistent nodes. An
    /// existing target is not an error. Returns `path`.
    async fn create_recursive(&self, path: &str, data: &[u8]) -> Result<String, CoordinationError>;

    /// Create a single node whose parent must exist. Returns the real path,
    /// which differs from `path` for sequential modes.
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String, CoordinationError>;

    /// Overwrite data; `NoNode` when `path` is absent.
    async fn set_data(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError>;

    /// Current data plus a one-shot watch on the next change.
    async fn get_data_watch(&self, path: &str)
        -> Result<(Vec<u8>, DataWatch), CoordinationError>;
}

/// Opens sessions against a comma-separated host list.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        hosts: &str,
        config: &SessionConfig,
    ) -> Result<Arc<dyn Coordinator>, CoordinationError>;
}
