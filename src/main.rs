//! blobcopy - Azure Blob Copy Coordination Tool
//!
//! A command-line tool for coordinating Azure Blob Storage server-side
//! copy operations, written in Rust for performance, safety, and
//! reliability.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blobcopy::cli::{Cli, Commands};
use blobcopy::config::{self, Config};
use blobcopy::error::Result;

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the command
    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting bcp");

    // Commands that operate on explicit URIs or on the configuration
    // itself run without a validated storage account context.
    let config: Config = match &cli.command {
        Commands::Config { .. } | Commands::Version | Commands::CopyBlob { .. } => {
            config::load_config_unvalidated().await?
        }
        _ => config::load_config().await?,
    };

    // Execute the command
    cli.execute(config).await?;

    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blobcopy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
