//! # disconf-sync
//!
//! Configuration synchronization engine.
//!
//! [`SyncOrchestrator::start`] resolves the coordination service through the
//! registry's bootstrap endpoints, runs one [`node::CoordinationNode`] per
//! watched key, and funnels their reports through the [`Aggregator`] into a
//! single destination file. Lifecycle events arrive on the returned
//! [`SyncHandle`].

pub mod aggregator;
pub mod api;
pub mod coordination;
pub mod error;
pub mod fetcher;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod node;
pub mod orchestrator;
pub mod writer;
pub mod zookeeper;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::Aggregator;
pub use api::{BootstrapInfo, RegistryApi};
pub use coordination::{Connector, Coordinator, CreateMode, SessionConfig, WatchEvent};
pub use error::{CoordinationError, FetchError, SyncError};
pub use fetcher::{Body, Endpoints, HttpFetcher, HttpResponse, HttpTransport, UreqTransport};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryCoordinator;
pub use orchestrator::{SyncEvent, SyncHandle, SyncOrchestrator};
pub use zookeeper::ZkConnector;
