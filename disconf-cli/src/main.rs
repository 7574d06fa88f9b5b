//! Disconf: local mirror of remotely managed configuration.
//!
//! # Usage
//!
//! ```text
//! disconf [--config-dir <dir>] [--file <name>] [--set key=value]... <command>
//!
//! disconf run [--once]
//! disconf options [--json]
//! disconf bootstrap
//! disconf fetch <file|item> <name>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    bootstrap::BootstrapArgs, fetch::FetchArgs, options::OptionsArgs, run::RunArgs, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "disconf",
    version,
    about = "Keep a local property file in sync with a remote configuration registry",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync and watch until interrupted (or until ready with --once).
    Run(RunArgs),

    /// Show resolved client options and where each value came from.
    Options(OptionsArgs),

    /// Resolve coordination hosts and path prefix from the registry.
    Bootstrap(BootstrapArgs),

    /// Fetch and print one configuration payload.
    Fetch(FetchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(&cli.global),
        Commands::Options(args) => args.run(&cli.global),
        Commands::Bootstrap(args) => args.run(&cli.global),
        Commands::Fetch(args) => args.run(&cli.global),
    }
}
