//! Gather command - List the files of a container
//!
//! `icloud-storage gather <CONTAINER>` prints the current listing once.
//! With `--watch` the listing is printed again on every change until
//! interrupted.

use anyhow::{Context, Result};
use clap::Args;
use icloud_storage_core::config::Config;
use icloud_storage_core::domain::ContainerId;

use super::{build_service, cli_channel, follow};
use crate::output::{get_formatter, OutputFormat};

/// List the files of a container
#[derive(Debug, Args)]
pub struct GatherCommand {
    /// Container identifier
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Keep running and print the listing whenever it changes
    #[arg(long)]
    pub watch: bool,
}

impl GatherCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = build_service(config);
        let container = ContainerId::new(&self.container)?;

        if !self.watch {
            let files = service
                .gather(&container, None)
                .await
                .with_context(|| format!("Failed to list {}", self.container))?;
            formatter.listing(&files);
            return Ok(());
        }

        let channel = cli_channel("gather")?;
        let mut stream = service.create_channel(&channel)?;
        let files = service.gather(&container, Some(&channel)).await?;
        formatter.listing(&files);
        formatter.info("Watching for changes, press Ctrl-C to stop");

        tokio::select! {
            result = follow(&mut stream, formatter.as_ref()) => result,
            _ = tokio::signal::ctrl_c() => {
                service.cancel_channel(&channel);
                Ok(())
            }
        }
    }
}
