//! `disconf bootstrap`: ask the registry where the coordination service is.

use anyhow::{Context, Result};
use clap::Args;

use super::{block_on, registry, GlobalArgs};

/// Arguments for `disconf bootstrap`.
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl BootstrapArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let api = registry(global.load()?.options)?;
        let info = block_on(api.bootstrap())?.context("bootstrap request failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            println!("hosts:  {}", info.hosts);
            println!("prefix: {}", info.prefix);
        }
        Ok(())
    }
}
