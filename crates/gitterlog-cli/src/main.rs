use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod backup;
mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "gitterlog")]
#[command(about = "Archive Gitter rooms and keep a search index in step.")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "gitterlog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new messages for every archivable room and index them
    Sync {
        /// Skip the search backend even when the config enables it
        #[arg(long)]
        no_index: bool,
    },

    /// Show per-room archive and ledger counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Debug logs stay hidden unless RUST_LOG asks for them.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { no_index } => commands::sync::run(&cli.config, no_index).await,
        Commands::Status { json } => commands::status::run(&cli.config, json),
    }
}
