use std::future::Future;

use disconf_core::{ClientOptions, Properties};
use disconf_sync::{Connector, SyncEvent, SyncOrchestrator, ZkConnector};

use crate::error::{io_err, DaemonError};

/// How long [`start_blocking`] keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Until ctrl-c or until the sync engine stops.
    Foreground,
    /// Until the first `ready` (or the first error before it).
    UntilReady,
}

/// What a run observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ready: bool,
    /// The snapshot carried by `ready`; `None` when remote sync is disabled.
    pub snapshot: Option<Properties>,
    pub changes: usize,
    pub errors: usize,
}

impl RunSummary {
    fn record(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Ready(Some(snapshot)) => {
                tracing::info!(keys = snapshot.len(), "configuration ready");
                self.ready = true;
                self.snapshot = Some(snapshot);
            }
            SyncEvent::Ready(None) => {
                tracing::info!("ready (remote sync disabled)");
                self.ready = true;
            }
            SyncEvent::Change {
                key,
                cause,
                payload,
            } => {
                tracing::info!(
                    key = %key,
                    cause = %cause,
                    entries = payload.len(),
                    "configuration changed"
                );
                self.changes += 1;
            }
            SyncEvent::Error(err) => {
                tracing::error!(error = %err, "sync error");
                self.errors += 1;
            }
        }
    }
}

/// Build a runtime, install tracing and run the client until `mode` is done.
///
/// Coordination goes to the ZooKeeper hosts announced by the registry.
pub fn start_blocking(options: ClientOptions, mode: RunMode) -> Result<RunSummary, DaemonError> {
    init_tracing(options.debug);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    let orchestrator = SyncOrchestrator::new(options, ZkConnector::new());

    runtime.block_on(async {
        match mode {
            RunMode::Foreground => run(&orchestrator, ctrl_c()).await,
            RunMode::UntilReady => {
                let snapshot = run_until_ready(&orchestrator).await?;
                Ok(RunSummary {
                    ready: true,
                    snapshot,
                    ..RunSummary::default()
                })
            }
        }
    })
}

/// Start the engine and log its events until `shutdown` resolves or the
/// engine stops on its own.
pub async fn run<C, F>(
    orchestrator: &SyncOrchestrator<C>,
    shutdown: F,
) -> Result<RunSummary, DaemonError>
where
    C: Connector,
    F: Future<Output = ()>,
{
    let mut handle = orchestrator.start().await?;
    let mut summary = RunSummary::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            event = handle.next_event() => match event {
                Some(event) => summary.record(event),
                None => {
                    tracing::info!("sync engine stopped");
                    break;
                }
            },
        }
    }
    Ok(summary)
}

/// Start the engine and return the `ready` snapshot. Every task is stopped
/// before this returns.
pub async fn run_until_ready<C: Connector>(
    orchestrator: &SyncOrchestrator<C>,
) -> Result<Option<Properties>, DaemonError> {
    let mut handle = orchestrator.start().await?;
    Ok(handle.wait_ready().await?)
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => tracing::error!(error = %err, "ctrl-c handler failed, shutting down"),
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
