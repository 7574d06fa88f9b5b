//! In-memory coordination store for tests.
//!
//! Built for this crate's tests and, with the `test-support` feature, for
//! other crates' tests. [`MemoryCoordinator`] keeps a node tree in process
//! memory and follows the ZooKeeper rules the sync engine relies on:
//!
//! - `create` needs an existing parent; `create_recursive` fills in ancestors.
//! - Sequential nodes get a 10-digit, zero-padded, per-parent counter suffix.
//! - Watches fire once, on `set_data` or removal of the watched node.
//! - [`MemoryCoordinator::expire_session`] drops every ephemeral node, fires
//!   `SessionExpired` on all pending watches and fails later calls until the
//!   next [`Connector::connect`].
//!
//! Clones share one tree, so a test can hold a handle while the engine holds
//! the session it was given by `connect`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::coordination::{
    Connector, Coordinator, CreateMode, DataWatch, SessionConfig, WatchEvent,
};
use crate::error::CoordinationError;

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    ephemeral: bool,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    sequences: HashMap<String, u64>,
    watches: HashMap<String, Vec<oneshot::Sender<WatchEvent>>>,
    failing: Vec<String>,
    refuse_connections: bool,
    expired: bool,
    connects: usize,
}

impl Tree {
    fn contains(&self, path: &str) -> bool {
        path == "/" || self.nodes.contains_key(path)
    }

    fn guard(&self, path: &str) -> Result<(), CoordinationError> {
        if self.expired {
            return Err(CoordinationError::SessionExpired);
        }
        if let Some(prefix) = self.failing.iter().find(|p| path.starts_with(p.as_str())) {
            return Err(CoordinationError::Other(format!(
                "injected failure for {path} (prefix {prefix})"
            )));
        }
        validate(path)
    }

    fn fire(&mut self, path: &str, event: WatchEvent) {
        for tx in self.watches.remove(path).unwrap_or_default() {
            let _ = tx.send(event.clone());
        }
    }

    fn insert(&mut self, path: String, data: &[u8], ephemeral: bool) {
        self.nodes.insert(
            path,
            Node {
                data: data.to_vec(),
                ephemeral,
            },
        );
    }
}

fn validate(path: &str) -> Result<(), CoordinationError> {
    let ok = path.starts_with('/')
        && (path == "/" || !path.ends_with('/'))
        && !path.contains("//");
    if ok {
        Ok(())
    } else {
        Err(CoordinationError::Other(format!("invalid path: {path:?}")))
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// In-process coordination store and connector.
#[derive(Debug, Clone, Default)]
pub struct MemoryCoordinator {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Data stored at `path`, if the node exists.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().nodes.get(path).map(|n| n.data.clone())
    }

    /// Full paths of the direct children of `path`, sorted.
    pub fn children(&self, path: &str) -> Vec<String> {
        let tree = self.lock();
        tree.nodes
            .keys()
            .filter(|p| p.as_str() != path && parent_of(p) == path)
            .cloned()
            .collect()
    }

    /// Delete `path` and its subtree. Watches on removed nodes fire `Deleted`.
    pub fn remove(&self, path: &str) -> bool {
        let mut tree = self.lock();
        let doomed: Vec<String> = tree
            .nodes
            .keys()
            .filter(|p| p.as_str() == path || p.starts_with(&format!("{path}/")))
            .cloned()
            .collect();
        for p in &doomed {
            tree.nodes.remove(p);
            tree.fire(p, WatchEvent::Deleted { path: p.clone() });
        }
        !doomed.is_empty()
    }

    /// End the current session: ephemerals vanish and every watch fires.
    pub fn expire_session(&self) {
        let mut tree = self.lock();
        tree.nodes.retain(|_, n| !n.ephemeral);
        tree.expired = true;
        for (_, senders) in tree.watches.drain() {
            for tx in senders {
                let _ = tx.send(WatchEvent::SessionExpired);
            }
        }
    }

    /// Make every call touching a path under `prefix` fail.
    pub fn inject_failure(&self, prefix: &str) {
        self.lock().failing.push(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Number of sessions opened through [`Connector::connect`].
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        let tree = self.lock();
        tree.guard(path)?;
        Ok(tree.contains(path))
    }

    async fn create_recursive(&self, path: &str, data: &[u8]) -> Result<String, CoordinationError> {
        let mut tree = self.lock();
        tree.guard(path)?;
        if tree.contains(path) {
            return Ok(path.to_string());
        }
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if !tree.contains(&current) {
                let seed: &[u8] = if current == path { data } else { &[] };
                tree.insert(current.clone(), seed, false);
            }
        }
        Ok(path.to_string())
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let mut tree = self.lock();
        tree.guard(path)?;
        let parent = parent_of(path).to_string();
        if !tree.contains(&parent) {
            return Err(CoordinationError::NoNode(parent));
        }
        let real = match mode {
            CreateMode::Persistent => {
                if tree.contains(path) {
                    return Err(CoordinationError::NodeExists(path.to_string()));
                }
                path.to_string()
            }
            CreateMode::EphemeralSequential => {
                let seq = tree.sequences.entry(parent).or_insert(0);
                let real = format!("{path}{:010}", *seq);
                *seq += 1;
                real
            }
        };
        tree.insert(real.clone(), data, mode == CreateMode::EphemeralSequential);
        Ok(real)
    }

    async fn set_data(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError> {
        let mut tree = self.lock();
        tree.guard(path)?;
        match tree.nodes.get_mut(path) {
            Some(node) => node.data = data.to_vec(),
            None => return Err(CoordinationError::NoNode(path.to_string())),
        }
        tree.fire(
            path,
            WatchEvent::DataChanged {
                path: path.to_string(),
            },
        );
        Ok(())
    }

    async fn get_data_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, DataWatch), CoordinationError> {
        let mut tree = self.lock();
        tree.guard(path)?;
        let data = match tree.nodes.get(path) {
            Some(node) => node.data.clone(),
            None => return Err(CoordinationError::NoNode(path.to_string())),
        };
        let (tx, rx) = oneshot::channel();
        tree.watches.entry(path.to_string()).or_default().push(tx);
        Ok((data, rx))
    }
}

#[async_trait]
impl Connector for MemoryCoordinator {
    async fn connect(
        &self,
        hosts: &str,
        config: &SessionConfig,
    ) -> Result<Arc<dyn Coordinator>, CoordinationError> {
        let mut tree = self.lock();
        if tree.refuse_connections {
            return Err(CoordinationError::Other(format!(
                "connection to {hosts} refused"
            )));
        }
        tree.connects += 1;
        tree.expired = false;
        tracing::debug!(
            hosts,
            session_timeout_ms = config.session_timeout.as_millis() as u64,
            "opened in-memory coordination session"
        );
        Ok(Arc::new(self.clone()))
    }
}
