//! `disconf fetch`: one payload, normalized to properties.

use anyhow::{Context, Result};
use clap::Args;

use disconf_core::{ConfigKey, ConfigKind};
use disconf_sync::node::normalize;

use super::{block_on, registry, GlobalArgs};

/// Arguments for `disconf fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// `file` or `item`.
    pub kind: ConfigKind,

    /// File or item name.
    pub name: String,
}

impl FetchArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let api = registry(global.load()?.options)?;
        let key = ConfigKey {
            kind: self.kind,
            name: self.name,
        };
        let raw = block_on(api.config_payload(&key))?
            .with_context(|| format!("failed to fetch {key}"))?;
        print!("{}", normalize(&key, &raw));
        Ok(())
    }
}
