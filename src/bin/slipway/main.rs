//! Slipway CLI - Python wheels from Meson builds

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// `-v` widens the filter to debug for slipway's own targets.
fn init_tracing(verbose: bool) {
    let filter = if verbose { "slipway=debug" } else { "slipway=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .without_time()
        .init();
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Sdist(args) => commands::sdist::execute(args),
        Commands::Develop(args) => commands::develop::execute(args),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Doctor(args) => commands::doctor::execute(args, cli.verbose),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
