//! Per-key lifecycle against the coordination service.
//!
//! ## States
//!
//! ```text
//! EnsuringPath ──► Watching ──► Refreshing ──► Publishing ─┐
//!      ▲              ▲                                     │
//!      │              └──────────── DataChanged ◄───────────┘
//!      └─────────────────────────── Deleted / NoNode
//! ```
//!
//! The watch is armed before each refresh so no change between the read and
//! the re-arm is lost. `SessionExpired`, or an error while ensuring the path
//! or arming the watch, ends the node after it reports the failure.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use disconf_core::{properties, ConfigKey, ConfigKind, CoordinationPath, Properties};

use crate::api::RegistryApi;
use crate::coordination::{Coordinator, CreateMode, WatchEvent};
use crate::error::{CoordinationError, SyncError};
use crate::writer::save_download;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The node's ephemeral liveness marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Unregistered,
    /// Sequence-suffixed path assigned by the store.
    Registered(String),
}

/// What a node tells the aggregator.
#[derive(Debug)]
pub enum NodeReport {
    /// First successful refresh.
    Ready { key: ConfigKey, payload: Properties },
    /// Any later successful refresh.
    Changed {
        key: ConfigKey,
        cause: WatchEvent,
        payload: Properties,
    },
    Failed { key: ConfigKey, error: SyncError },
}

impl NodeReport {
    pub fn key(&self) -> &ConfigKey {
        match self {
            NodeReport::Ready { key, .. }
            | NodeReport::Changed { key, .. }
            | NodeReport::Failed { key, .. } => key,
        }
    }
}

/// Everything a node shares with its siblings.
#[derive(Clone)]
pub struct NodeContext {
    pub session: Arc<dyn Coordinator>,
    pub api: RegistryApi,
    pub prefix: String,
    pub download_dir: PathBuf,
    /// Host name; seeds new persistent paths and names presence nodes.
    pub host: String,
    pub reports: mpsc::Sender<NodeReport>,
}

/// Local host name, or `localhost` when it cannot be read.
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Turn a raw payload into properties: files are parsed, an item becomes the
/// single pair `name=value`.
pub fn normalize(key: &ConfigKey, raw: &str) -> Properties {
    match key.kind {
        ConfigKind::File => properties::parse(raw),
        ConfigKind::Item => [(key.name.clone(), raw.to_string())].into_iter().collect(),
    }
}

// ---------------------------------------------------------------------------
// CoordinationNode
// ---------------------------------------------------------------------------

pub struct CoordinationNode {
    key: ConfigKey,
    path: CoordinationPath,
    ctx: NodeContext,
    presence: Presence,
    presence_name: String,
    ready: bool,
}

impl CoordinationNode {
    pub fn new(key: ConfigKey, ctx: NodeContext) -> Self {
        let path = CoordinationPath::new(&ctx.prefix, ctx.api.identity(), &key);
        let presence_name = format!(
            "{}_{}_{}",
            ctx.host,
            std::process::id(),
            Uuid::new_v4().simple()
        );
        Self {
            key,
            path,
            ctx,
            presence: Presence::Unregistered,
            presence_name,
            ready: false,
        }
    }

    pub fn path(&self) -> &CoordinationPath {
        &self.path
    }

    /// Drive the node until its session ends or the aggregator goes away.
    pub async fn run(mut self) {
        let span = tracing::info_span!("node", key = %self.key);
        async move {
            self.watch_loop().await;
            tracing::debug!("node stopped");
        }
        .instrument(span)
        .await
    }

    async fn watch_loop(&mut self) {
        let mut cause: Option<WatchEvent> = None;

        'ensure: loop {
            if let Err(err) = self.ensure_path().await {
                self.fail(err.into()).await;
                return;
            }

            loop {
                let watch = match self.ctx.session.get_data_watch(self.path.as_str()).await {
                    Ok((_, watch)) => watch,
                    Err(CoordinationError::NoNode(path)) => {
                        cause = Some(WatchEvent::Deleted { path });
                        continue 'ensure;
                    }
                    Err(err) => {
                        self.fail(err.into()).await;
                        return;
                    }
                };

                if !self.refresh(cause.take()).await {
                    return;
                }

                match watch.await {
                    Ok(event @ WatchEvent::DataChanged { .. }) => {
                        tracing::debug!(%event, "watch fired");
                        cause = Some(event);
                    }
                    Ok(event @ WatchEvent::Deleted { .. }) => {
                        tracing::info!(%event, "coordination path removed, recreating");
                        cause = Some(event);
                        continue 'ensure;
                    }
                    Ok(WatchEvent::SessionExpired) => {
                        self.fail(CoordinationError::SessionExpired.into()).await;
                        return;
                    }
                    Err(_) => {
                        self.fail(SyncError::ChannelClosed("data watch")).await;
                        return;
                    }
                }
            }
        }
    }

    /// Existing paths are trusted as they are.
    async fn ensure_path(&self) -> Result<(), CoordinationError> {
        let path = self.path.as_str();
        if self.ctx.session.exists(path).await? {
            tracing::debug!(path, "reusing existing coordination path");
            return Ok(());
        }
        self.ctx
            .session
            .create_recursive(path, self.ctx.host.as_bytes())
            .await?;
        tracing::info!(path, "created coordination path");
        Ok(())
    }

    /// Fetch, normalize, publish and report. Returns false once the
    /// aggregator has stopped listening.
    async fn refresh(&mut self, cause: Option<WatchEvent>) -> bool {
        let report = match self.fetch().await {
            Ok((raw, payload)) => {
                self.publish(&raw, &payload).await;
                if self.ready {
                    let cause = cause.unwrap_or_else(|| WatchEvent::DataChanged {
                        path: self.path.to_string(),
                    });
                    NodeReport::Changed {
                        key: self.key.clone(),
                        cause,
                        payload,
                    }
                } else {
                    self.ready = true;
                    NodeReport::Ready {
                        key: self.key.clone(),
                        payload,
                    }
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "refresh failed");
                NodeReport::Failed {
                    key: self.key.clone(),
                    error,
                }
            }
        };
        self.ctx.reports.send(report).await.is_ok()
    }

    async fn fetch(&self) -> Result<(String, Properties), SyncError> {
        let raw = self.ctx.api.config_payload(&self.key).await?;
        save_download(&self.ctx.download_dir, &self.key.name, &raw).await;
        let payload = normalize(&self.key, &raw);
        Ok((raw, payload))
    }

    /// Push the latest payload to the presence node, recreating it when it
    /// has gone missing. Failures are logged only.
    async fn publish(&mut self, raw: &str, payload: &Properties) {
        let data = match self.key.kind {
            ConfigKind::File => match serde_json::to_vec(payload) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(error = %err, "presence payload not encodable");
                    return;
                }
            },
            ConfigKind::Item => raw.as_bytes().to_vec(),
        };

        if let Presence::Registered(real) = &self.presence {
            match self.ctx.session.set_data(real, &data).await {
                Ok(()) => return,
                Err(CoordinationError::NoNode(_)) => {
                    tracing::debug!(path = %real, "presence node missing, recreating");
                    self.presence = Presence::Unregistered;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "presence update failed");
                    return;
                }
            }
        }

        let base = self.path.child(&self.presence_name);
        match self
            .ctx
            .session
            .create(&base, &data, CreateMode::EphemeralSequential)
            .await
        {
            Ok(real) => {
                tracing::debug!(path = %real, "registered presence node");
                self.presence = Presence::Registered(real);
            }
            Err(err) => tracing::warn!(error = %err, "presence registration failed"),
        }
    }

    async fn fail(&self, error: SyncError) {
        tracing::error!(error = %error, "node failed");
        let _ = self
            .ctx
            .reports
            .send(NodeReport::Failed {
                key: self.key.clone(),
                error,
            })
            .await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
