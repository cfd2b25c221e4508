//! Move command - Move an item within a container

use anyhow::Result;
use clap::Args;
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{ContainerId, RelativePath};

use super::build_service;
use crate::output::{get_formatter, OutputFormat};

/// Move or rename an item within a container
#[derive(Debug, Args)]
pub struct MoveCommand {
    /// Container identifier
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Current path inside the container
    #[arg(value_name = "FROM")]
    pub from: String,

    /// New path inside the container; missing directories are created
    #[arg(value_name = "TO")]
    pub to: String,
}

impl MoveCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = build_service(config);
        let container = ContainerId::new(&self.container)?;
        let from = RelativePath::new(&self.from)?;
        let to = RelativePath::new(&self.to)?;

        service.move_item(&container, &from, &to).await?;
        formatter.success(&format!("Moved {} to {}", from, to));
        Ok(())
    }
}
