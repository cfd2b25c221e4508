//! Upload command - Copy a local file into a container
//!
//! The copy itself is synchronous. With `--watch` the command also follows
//! the upload progress until the item is fully uploaded.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{ContainerId, RelativePath};

use super::{build_service, cli_channel, follow};
use crate::output::{get_formatter, OutputFormat};

/// Copy a local file into a container
#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Container identifier
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Local file to upload
    #[arg(value_name = "LOCAL")]
    pub local: PathBuf,

    /// Destination path inside the container
    #[arg(value_name = "CLOUD_PATH")]
    pub cloud: String,

    /// Follow upload progress until it completes
    #[arg(long)]
    pub watch: bool,
}

impl UploadCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = build_service(config);
        let container = ContainerId::new(&self.container)?;
        let cloud = RelativePath::new(&self.cloud)?;

        if !self.watch {
            service
                .upload(&container, &self.local, &cloud, None)
                .await
                .with_context(|| format!("Failed to upload {}", self.local.display()))?;
            formatter.success(&format!("Uploaded {} to {}", self.local.display(), cloud));
            return Ok(());
        }

        let channel = cli_channel("upload")?;
        let mut stream = service.create_channel(&channel)?;
        service
            .upload(&container, &self.local, &cloud, Some(&channel))
            .await
            .with_context(|| format!("Failed to upload {}", self.local.display()))?;
        follow(&mut stream, formatter.as_ref()).await
    }
}
