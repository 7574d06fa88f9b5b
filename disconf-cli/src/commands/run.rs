//! `disconf run`: sync, then keep watching.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use disconf_daemon::{start_blocking, RunMode};

use super::GlobalArgs;

/// Arguments for `disconf run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Exit as soon as every key has been fetched once.
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let options = global.load()?.options;
        let dist = options.dist_file.clone();
        let mode = if self.once {
            RunMode::UntilReady
        } else {
            RunMode::Foreground
        };

        let summary = start_blocking(options, mode).context("client exited with error")?;

        match (&summary.snapshot, summary.ready) {
            (Some(snapshot), true) => println!(
                "{} ready: {} keys written to {}",
                "✓".green(),
                snapshot.len(),
                dist.display()
            ),
            (None, true) => println!("{} ready (remote sync disabled)", "✓".green()),
            (_, false) => println!("{} stopped before ready", "✗".red()),
        }
        if !self.once {
            println!("{} changes, {} errors", summary.changes, summary.errors);
        }
        Ok(())
    }
}
