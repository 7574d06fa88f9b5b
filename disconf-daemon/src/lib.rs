//! Foreground runtime for the disconf client: tracing, event loop, shutdown.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{run, run_until_ready, start_blocking, RunMode, RunSummary};
