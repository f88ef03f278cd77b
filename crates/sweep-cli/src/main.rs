//! `sweep` - resumable headless-browser lookups from the command line.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};
use tracing::info;

/// Initialize tracing subscriber for logging. Logs go to stderr so stdout
/// carries only results.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sweep=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting sweep v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run(args).await,
        Command::Show(args) => commands::show(args).await,
    }
}
