//! Delete command - Remove an item from a container

use anyhow::Result;
use clap::Args;
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{ContainerId, RelativePath};

use super::build_service;
use crate::output::{get_formatter, OutputFormat};

/// Remove a file or directory from a container
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Container identifier
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Item path inside the container
    #[arg(value_name = "CLOUD_PATH")]
    pub cloud: String,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = build_service(config);
        let container = ContainerId::new(&self.container)?;
        let cloud = RelativePath::new(&self.cloud)?;

        service.delete(&container, &cloud).await?;
        formatter.success(&format!("Deleted {}", cloud));
        Ok(())
    }
}
