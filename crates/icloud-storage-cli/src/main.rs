//! icloud-storage CLI - Command-line interface over container storage
//!
//! Provides commands for:
//! - Listing a container, optionally watching it for changes
//! - Uploading local files and following upload progress
//! - Downloading items out of a container
//! - Deleting and moving items within a container

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    delete::DeleteCommand, download::DownloadCommand, gather::GatherCommand,
    move_item::MoveCommand, upload::UploadCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "icloud-storage",
    version,
    about = "Manage files in cloud-synced containers"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the files of a container
    Gather(GatherCommand),
    /// Copy a local file into a container
    Upload(UploadCommand),
    /// Copy an item out of a container
    Download(DownloadCommand),
    /// Remove an item from a container
    Delete(DeleteCommand),
    /// Move an item within a container
    Move(MoveCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    // Setup tracing
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Gather(cmd) => cmd.execute(&config, format).await,
        Commands::Upload(cmd) => cmd.execute(&config, format).await,
        Commands::Download(cmd) => cmd.execute(&config, format).await,
        Commands::Delete(cmd) => cmd.execute(&config, format).await,
        Commands::Move(cmd) => cmd.execute(&config, format).await,
    }
}
