//! CLI subcommands
//!
//! Every command runs against a [`StorageService`] wired to the local
//! adapters: containers are plain directories listed in the configuration
//! file, indexed by `LocalDirectoryIndex`.

pub mod delete;
pub mod download;
pub mod gather;
pub mod move_item;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{Channel, ChannelEvent};
use icloud_storage_sync::container::MappedContainerResolver;
use icloud_storage_sync::filesystem::LocalFileCoordinator;
use icloud_storage_sync::local_index::LocalDirectoryIndex;
use icloud_storage_sync::{EventStream, StorageService};

use crate::output::OutputFormatter;

/// Loads the configuration file and rejects invalid settings
///
/// An explicit path must exist; the default path falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }
    Ok(config)
}

/// Builds the service over the local adapters
pub fn build_service(config: &Config) -> StorageService {
    StorageService::new(
        Arc::new(LocalDirectoryIndex::new()),
        Arc::new(MappedContainerResolver::from_config(config)),
        Arc::new(LocalFileCoordinator::new()),
    )
    .with_stall_fallback(config.monitoring.stall_fallback.clone())
}

/// Channel name unique to this process and operation
pub fn cli_channel(operation: &str) -> Result<Channel> {
    Ok(Channel::new(format!(
        "cli-{operation}-{}",
        std::process::id()
    ))?)
}

/// Prints channel events until the terminal one
///
/// # Errors
/// Returns the channel's error event as an error.
pub async fn follow(stream: &mut EventStream, formatter: &dyn OutputFormatter) -> Result<()> {
    while let Some(event) = stream.recv().await {
        match event {
            ChannelEvent::Error(e) => {
                formatter.event(&ChannelEvent::Error(e.clone()));
                return Err(e.into());
            }
            event => formatter.event(&event),
        }
    }
    Ok(())
}
