//! `disconf options`: resolved option table with provenance.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use disconf_core::options::{OptionSource, ResolvedOption};

use super::GlobalArgs;

/// Arguments for `disconf options`.
#[derive(Args, Debug)]
pub struct OptionsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct OptionsJson {
    bootstrap_file: Option<String>,
    options: Vec<ResolvedOption>,
}

#[derive(Tabled)]
struct OptionRow {
    #[tabled(rename = "option")]
    key: String,
    #[tabled(rename = "value")]
    value: String,
    #[tabled(rename = "source")]
    source: String,
}

impl OptionsArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let loaded = global.load()?;

        if self.json {
            let payload = OptionsJson {
                bootstrap_file: loaded.bootstrap_file.map(|p| p.display().to_string()),
                options: loaded.resolved,
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(());
        }

        match &loaded.bootstrap_file {
            Some(path) => println!("Bootstrap file: {}", path.display()),
            None => println!("Bootstrap file: {}", "(none)".bright_black()),
        }
        let rows: Vec<OptionRow> = loaded
            .resolved
            .into_iter()
            .map(|r| OptionRow {
                key: r.key,
                value: r.value,
                source: source_label(r.source),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn source_label(source: OptionSource) -> String {
    match source {
        OptionSource::Explicit => source.to_string().cyan().to_string(),
        OptionSource::File => source.to_string().green().to_string(),
        OptionSource::Default => source.to_string().bright_black().to_string(),
    }
}
