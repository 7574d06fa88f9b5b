//! Merges node reports into one snapshot and one destination file.
//!
//! The aggregator runs as a single task fed by a channel, so merge-and-write
//! steps from different nodes never interleave.
//!
//! ## Readiness
//!
//! `ready` is emitted once, after every watched key has reported a first
//! success and the destination file has been written. If that write fails the
//! error is emitted and the write is retried on the next report.
//!
//! Every change report is merged and written out, before or after ready. A
//! change whose write fails surfaces as an `Error` only.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::mpsc;

use disconf_core::{merge, ConfigKey, Properties};

use crate::coordination::WatchEvent;
use crate::error::SyncError;
use crate::node::NodeReport;
use crate::orchestrator::SyncEvent;
use crate::writer::write_properties;

#[derive(Debug)]
pub struct Aggregator {
    snapshot: Properties,
    expected: HashSet<ConfigKey>,
    ready_keys: HashSet<ConfigKey>,
    dest: PathBuf,
    ready_emitted: bool,
}

impl Aggregator {
    pub fn new(dest: impl Into<PathBuf>, keys: &[ConfigKey]) -> Self {
        Self {
            snapshot: Properties::new(),
            expected: keys.iter().cloned().collect(),
            ready_keys: HashSet::new(),
            dest: dest.into(),
            ready_emitted: false,
        }
    }

    pub fn snapshot(&self) -> &Properties {
        &self.snapshot
    }

    /// Distinct watched keys that have reported a first success.
    pub fn ready_count(&self) -> usize {
        self.ready_keys.len()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_emitted
    }

    /// Lay `payload` over the snapshot and return the result.
    pub fn merge(&mut self, key: &ConfigKey, payload: &Properties) -> &Properties {
        tracing::trace!(key = %key, entries = payload.len(), "merging payload");
        self.snapshot = merge(&self.snapshot, payload);
        &self.snapshot
    }

    /// Consume reports until every node is gone or nobody listens.
    pub async fn run(
        mut self,
        mut reports: mpsc::Receiver<NodeReport>,
        events: mpsc::Sender<SyncEvent>,
    ) {
        while let Some(report) = reports.recv().await {
            for event in self.handle(report).await {
                if events.send(event).await.is_err() {
                    tracing::debug!("event receiver dropped, aggregator stopping");
                    return;
                }
            }
        }
        tracing::debug!("all nodes stopped, aggregator stopping");
    }

    pub async fn handle(&mut self, report: NodeReport) -> Vec<SyncEvent> {
        match report {
            NodeReport::Ready { key, payload } => self.on_node_ready(key, payload).await,
            NodeReport::Changed {
                key,
                cause,
                payload,
            } => self.on_node_changed(key, cause, payload).await,
            NodeReport::Failed { key, error } => vec![SyncEvent::Error(SyncError::Node {
                key: key.to_string(),
                source: Box::new(error),
            })],
        }
    }

    pub async fn on_node_ready(&mut self, key: ConfigKey, payload: Properties) -> Vec<SyncEvent> {
        self.merge(&key, &payload);
        if self.expected.contains(&key) && self.ready_keys.insert(key.clone()) {
            tracing::info!(
                key = %key,
                ready = self.ready_keys.len(),
                expected = self.expected.len(),
                "node ready"
            );
        }
        let mut events = Vec::new();
        self.try_ready(&mut events).await;
        events
    }

    pub async fn on_node_changed(
        &mut self,
        key: ConfigKey,
        cause: WatchEvent,
        payload: Properties,
    ) -> Vec<SyncEvent> {
        self.merge(&key, &payload);
        let mut events = Vec::new();
        let written = if self.ready_emitted || self.ready_keys.len() < self.expected.len() {
            match write_properties(&self.dest, &self.snapshot).await {
                Ok(()) => true,
                Err(err) => {
                    events.push(SyncEvent::Error(err));
                    false
                }
            }
        } else {
            self.try_ready(&mut events).await
        };
        if !written {
            return events;
        }
        tracing::info!(key = %key, cause = %cause, "configuration changed");
        events.push(SyncEvent::Change {
            key,
            cause,
            payload,
        });
        events
    }

    /// Write the destination and emit `ready` once every key has reported.
    /// Returns whether the write happened.
    async fn try_ready(&mut self, events: &mut Vec<SyncEvent>) -> bool {
        if self.ready_emitted || self.ready_keys.len() < self.expected.len() {
            return false;
        }
        match write_properties(&self.dest, &self.snapshot).await {
            Ok(()) => {
                self.ready_emitted = true;
                tracing::info!(keys = self.snapshot.len(), "all nodes ready");
                events.push(SyncEvent::Ready(Some(self.snapshot.clone())));
                true
            }
            Err(err) => {
                events.push(SyncEvent::Error(err));
                false
            }
        }
    }
}
