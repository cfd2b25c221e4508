//! Download command - Copy an item out of a container
//!
//! Requests the item, follows its download progress and copies it to the
//! local destination once it is current.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{ContainerId, RelativePath, StorageError};
use tracing::warn;

use super::{build_service, cli_channel, follow};
use crate::output::{get_formatter, OutputFormat};

/// Copy an item out of a container
#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Container identifier
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Item path inside the container
    #[arg(value_name = "CLOUD_PATH")]
    pub cloud: String,

    /// Local destination (replaced if it exists)
    #[arg(value_name = "LOCAL")]
    pub local: PathBuf,
}

impl DownloadCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = build_service(config);
        let container = ContainerId::new(&self.container)?;
        let cloud = RelativePath::new(&self.cloud)?;

        let channel = cli_channel("download")?;
        let mut stream = service.create_channel(&channel)?;
        formatter.info(&format!("Downloading {} to {}", cloud, self.local.display()));
        match service
            .download(&container, &cloud, &self.local, &channel)
            .await
        {
            Ok(()) => {}
            // The channel is still monitored after a rejected request
            Err(e @ StorageError::Native(_)) => {
                warn!(error = %e, "Download request failed");
                formatter.error(&e.to_string());
            }
            Err(e) => return Err(e.into()),
        }
        follow(&mut stream, formatter.as_ref()).await
    }
}
