//! checkmate CLI - wait until services report healthy
//!
//! Reads a checks file, probes every selected check until it passes or its
//! retry window closes, and exits non-zero when any check is rejected.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, &cli.config).await,
        Commands::Validate(args) => commands::validate::run(args, &cli.config),
    }
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr so `run --json` output stays parseable.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
