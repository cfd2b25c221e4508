//! Download progress monitor.
//!
//! Watches the single index item at the cloud path, reports its download
//! progress, and once the local replica is current copies it to the
//! caller's destination and completes the channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use icloud_storage_core::domain::{ChannelEvent, DownloadStatus, IndexRecord, Progress, StorageError};
use icloud_storage_core::ports::{IFileCoordinator, ISyncIndex, QueryScope};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{records_of, Flow};
use crate::registry::ChannelSink;
use crate::session::QuerySession;
use crate::transfer;

/// Monitor for one download
pub struct DownloadMonitor {
    sink: ChannelSink,
    session: QuerySession,
    token: CancellationToken,
    fs: Arc<dyn IFileCoordinator>,
    cloud_path: PathBuf,
    local_path: PathBuf,
}

impl DownloadMonitor {
    pub fn new(
        sink: ChannelSink,
        cloud_path: &Path,
        local_path: &Path,
        token: CancellationToken,
        fs: Arc<dyn IFileCoordinator>,
    ) -> Self {
        Self {
            sink,
            session: QuerySession::new(QueryScope::exact(cloud_path)),
            token,
            fs,
            cloud_path: cloud_path.to_path_buf(),
            local_path: local_path.to_path_buf(),
        }
    }

    /// Runs the monitor on a new task
    pub fn spawn(self, index: Arc<dyn ISyncIndex>) -> JoinHandle<()> {
        tokio::spawn(self.run(index))
    }

    /// Runs the monitor until the channel finishes or is cancelled
    pub async fn run(mut self, index: Arc<dyn ISyncIndex>) {
        let channel = self.sink.channel().clone();
        info!(channel = %channel, path = %self.cloud_path.display(), "Download monitor started");

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(channel = %channel, "Download cancelled before monitoring began");
                return;
            }
            _ = self.session.start(index.as_ref()) => {}
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(channel = %channel, "Download monitor cancelled");
                    break;
                }
                event = self.session.next() => event,
            };

            let Some(event) = event else {
                warn!(channel = %channel, "Index watch ended before the download completed");
                self.sink.fail(StorageError::Native(
                    "index watch ended before the download completed".to_string(),
                ));
                break;
            };

            match records_of(event) {
                Ok(records) => {
                    if self.on_records(&records).await == Flow::Finished {
                        break;
                    }
                }
                Err(e) => {
                    self.sink.fail(e);
                    break;
                }
            }
        }

        self.session.stop();
    }

    async fn on_records(&mut self, records: &[IndexRecord]) -> Flow {
        let Some(record) = records.first() else {
            debug!(channel = %self.sink.channel(), "Cloud item not indexed yet");
            return Flow::Continue;
        };

        if let Some(message) = &record.download_error {
            warn!(channel = %self.sink.channel(), error = %message, "Download failed");
            self.sink.fail(StorageError::Native(message.clone()));
            return Flow::Finished;
        }

        if let Some(percent) = record.percent_downloaded {
            self.sink.emit(ChannelEvent::Progress(Progress::new(percent)));
        }

        if record.download_status != DownloadStatus::Current {
            return Flow::Continue;
        }

        match transfer::copy_out_of_container(self.fs.as_ref(), &self.cloud_path, &self.local_path)
            .await
        {
            Ok(()) => {
                info!(channel = %self.sink.channel(), "Download completed");
                self.sink.complete();
            }
            Err(e) => {
                warn!(channel = %self.sink.channel(), error = %e, "Failed to copy downloaded item");
                self.sink.fail(e);
            }
        }
        Flow::Finished
    }
}
