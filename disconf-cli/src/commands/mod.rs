//! Subcommands and the option-loading flags they share.

pub mod bootstrap;
pub mod fetch;
pub mod options;
pub mod run;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use disconf_core::options::{self as client_options, keys, LoadedOptions, DEFAULT_BOOTSTRAP_FILE};
use disconf_core::{ClientOptions, Properties};
use disconf_sync::{RegistryApi, SyncOrchestrator, ZkConnector};

/// Flags accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Base directory for the bootstrap file and default outputs [default: ./config].
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Bootstrap file name inside the config directory.
    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_BOOTSTRAP_FILE)]
    pub file: String,

    /// Set an option explicitly; wins over the bootstrap file. Repeatable.
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,
}

impl GlobalArgs {
    /// Resolve options: `--set` > bootstrap file > defaults.
    pub fn load(&self) -> Result<LoadedOptions> {
        let base = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => client_options::default_base_dir().context("could not determine config dir")?,
        };
        let explicit: Properties = self.set.iter().cloned().collect();
        let loaded = client_options::load_at(&base, &self.file, &explicit)
            .with_context(|| format!("failed to load options from {}", base.display()))?;
        if loaded.bootstrap_file.is_none() {
            eprintln!(
                "{} no bootstrap file at {}, using defaults",
                "warning:".yellow().bold(),
                base.join(&self.file).display()
            );
        }
        Ok(loaded)
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if !keys::ALL.contains(&key) {
        return Err(format!(
            "unknown option '{key}'; expected one of: {}",
            keys::ALL.join(", ")
        ));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Registry client for one-off requests; needs `conf_server_host` and `app`.
pub(crate) fn registry(options: ClientOptions) -> Result<RegistryApi> {
    if options.server_hosts.is_empty() {
        bail!("option '{}' is not set", keys::CONF_SERVER_HOST);
    }
    options.require_remote()?;
    Ok(SyncOrchestrator::new(options, ZkConnector::new()).registry())
}

/// Run one future on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
