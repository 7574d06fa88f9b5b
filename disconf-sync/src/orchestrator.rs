//! Startup sequence and the event surface handed to the embedding program.
//!
//! ## `start` sequence
//!
//! 1. Remote sync disabled → emit `Ready(None)`; no HTTP, no session.
//! 2. Validate the options remote mode needs.
//! 3. Bootstrap: resolve coordination hosts and root prefix over HTTP.
//! 4. Open a coordination session.
//! 5. Build the watch set; when empty, write an empty destination and emit
//!    `Ready(Some(empty))`.
//! 6. Spawn the aggregator and one node task per key.
//!
//! Failures in steps 2–5 are returned from `start` and leave nothing running.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use disconf_core::{ClientOptions, ConfigKey, Properties};

use crate::aggregator::Aggregator;
use crate::api::{BootstrapInfo, RegistryApi};
use crate::coordination::{Connector, Coordinator, SessionConfig, WatchEvent};
use crate::error::SyncError;
use crate::fetcher::{Endpoints, HttpFetcher, HttpTransport, UreqTransport};
use crate::node::{host_name, CoordinationNode, NodeContext};
use crate::writer::write_properties;

/// Bound shared by the report and event channels.
const CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum SyncEvent {
    /// Every watched key has been fetched once. `None` when remote sync is
    /// disabled.
    Ready(Option<Properties>),
    /// A key's payload changed after its first fetch.
    Change {
        key: ConfigKey,
        cause: WatchEvent,
        payload: Properties,
    },
    /// A non-fatal failure; the engine keeps running.
    Error(SyncError),
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A running sync engine. Dropping it stops every task it owns.
pub struct SyncHandle {
    events: mpsc::Receiver<SyncEvent>,
    bootstrap: Option<BootstrapInfo>,
    session: Option<Arc<dyn Coordinator>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    fn immediate(
        event: SyncEvent,
        bootstrap: Option<BootstrapInfo>,
        session: Option<Arc<dyn Coordinator>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Fresh channel with capacity 1: cannot be full.
        let _ = tx.try_send(event);
        Self {
            events: rx,
            bootstrap,
            session,
            tasks: Vec::new(),
        }
    }

    /// Next lifecycle event; `None` once every task has stopped.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Wait for `Ready`, failing on the first error reported before it.
    pub async fn wait_ready(&mut self) -> Result<Option<Properties>, SyncError> {
        loop {
            match self.next_event().await {
                Some(SyncEvent::Ready(snapshot)) => return Ok(snapshot),
                Some(SyncEvent::Error(err)) => return Err(err),
                Some(SyncEvent::Change { key, .. }) => {
                    tracing::debug!(key = %key, "change before ready");
                }
                None => return Err(SyncError::ChannelClosed("sync events")),
            }
        }
    }

    /// Coordination hosts and prefix, when remote sync is enabled.
    pub fn bootstrap(&self) -> Option<&BootstrapInfo> {
        self.bootstrap.as_ref()
    }

    pub fn session(&self) -> Option<&Arc<dyn Coordinator>> {
        self.session.as_ref()
    }

    /// Number of spawned tasks (aggregator plus nodes).
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct SyncOrchestrator<C: Connector> {
    options: ClientOptions,
    connector: C,
    transport: Arc<dyn HttpTransport>,
    session_config: SessionConfig,
}

impl<C: Connector> SyncOrchestrator<C> {
    pub fn new(options: ClientOptions, connector: C) -> Self {
        Self {
            options,
            connector,
            transport: Arc::new(UreqTransport::new()),
            session_config: SessionConfig::default(),
        }
    }

    /// Replace the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Registry client built from the configured hosts and retry policy.
    pub fn registry(&self) -> RegistryApi {
        let fetcher = HttpFetcher::with_transport(
            Endpoints::parse(&self.options.server_hosts),
            self.options.fetch_config(),
            Arc::clone(&self.transport),
        );
        RegistryApi::new(fetcher, self.options.identity())
    }

    pub async fn start(&self) -> Result<SyncHandle, SyncError> {
        let opts = &self.options;
        if !opts.enable_remote {
            tracing::info!("remote sync disabled, ready without fetching");
            return Ok(SyncHandle::immediate(SyncEvent::Ready(None), None, None));
        }
        opts.require_remote()?;

        let api = self.registry();
        let bootstrap = api.bootstrap().await?;
        let session = self
            .connector
            .connect(&bootstrap.hosts, &self.session_config)
            .await?;

        let keys = opts.watch_set();
        if keys.is_empty() {
            tracing::info!("no keys to watch");
            let empty = Properties::new();
            write_properties(&opts.dist_file, &empty).await?;
            return Ok(SyncHandle::immediate(
                SyncEvent::Ready(Some(empty)),
                Some(bootstrap),
                Some(session),
            ));
        }

        let (report_tx, report_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut tasks = Vec::with_capacity(keys.len() + 1);

        let aggregator = Aggregator::new(&opts.dist_file, &keys);
        tasks.push(tokio::spawn(aggregator.run(report_rx, event_tx)));

        let ctx = NodeContext {
            session: Arc::clone(&session),
            api,
            prefix: bootstrap.prefix.clone(),
            download_dir: opts.download_dir.clone(),
            host: host_name(),
            reports: report_tx,
        };
        tracing::info!(keys = keys.len(), prefix = %ctx.prefix, "starting nodes");
        for key in keys {
            tasks.push(tokio::spawn(CoordinationNode::new(key, ctx.clone()).run()));
        }

        Ok(SyncHandle {
            events: event_rx,
            bootstrap: Some(bootstrap),
            session: Some(session),
            tasks,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
