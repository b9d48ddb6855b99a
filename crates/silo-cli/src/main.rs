//! silo CLI - the main entry point for the `silo` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use silo_cli::{Cli, Commands, SnapshotCommands};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.config();

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Snapshot(snapshot) => match snapshot.command {
                SnapshotCommands::List(args) => {
                    silo_cli::commands::list::execute(&args, &config).await
                }
                SnapshotCommands::Expire(args) => {
                    silo_cli::commands::expire::execute(args, &config).await
                }
            },
        }
    })
}
