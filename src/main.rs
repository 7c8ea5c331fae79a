mod aggregate;
mod cli;
mod commands;
mod dispatch;
mod export;
mod grid;
mod heatmap;
mod model;
mod search;
mod store;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "gridrank failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Grid(args) => commands::grid::run(args),
        Commands::Scan(args) => commands::scan::run(args),
        Commands::Rank(args) => commands::rank::run(args),
        Commands::Heatmap(args) => commands::heatmap::run(args),
        Commands::Export(args) => commands::export::run(args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    // hyper and reqwest stay at warn unless RUST_LOG asks for more
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gridrank=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
