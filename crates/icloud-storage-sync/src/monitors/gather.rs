//! Container listing monitor.
//!
//! A gather lists every file under a container root. Without a channel it is
//! one-shot: the first snapshot is mapped and the session stopped. With a
//! channel the initial listing is returned to the caller and every later
//! change is pushed as a full recomputed listing.

use icloud_storage_core::domain::{ChannelEvent, ContainerRoot, FileEntry, StorageError};
use icloud_storage_core::ports::{ISyncIndex, QueryScope};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::records_of;
use crate::registry::ChannelSink;
use crate::session::QuerySession;

/// Lists the container once
///
/// # Errors
/// Returns `StorageError::Native` if the index cannot be watched.
pub async fn gather_once(
    index: &dyn ISyncIndex,
    root: &ContainerRoot,
) -> Result<Vec<FileEntry>, StorageError> {
    let mut session = QuerySession::new(QueryScope::prefix(root.as_path()));
    session.start(index).await;
    let records = session.snapshot().await;
    session.stop();

    let files = FileEntry::from_records(root, &records?);
    debug!(root = %root, files = files.len(), "Gathered container listing");
    Ok(files)
}

/// Live listing of one container, fed into a channel
pub struct GatherMonitor {
    sink: ChannelSink,
    session: QuerySession,
    token: CancellationToken,
    root: ContainerRoot,
}

impl GatherMonitor {
    pub fn new(sink: ChannelSink, root: ContainerRoot, token: CancellationToken) -> Self {
        Self {
            sink,
            session: QuerySession::new(QueryScope::prefix(root.as_path())),
            token,
            root,
        }
    }

    /// Starts the session and waits for the initial listing
    ///
    /// On failure the channel is failed with the same error.
    ///
    /// # Errors
    /// - `StorageError::Cancelled` if the subscriber cancels first
    /// - `StorageError::Native` if the index cannot be watched
    pub async fn initial_listing(
        &mut self,
        index: &dyn ISyncIndex,
    ) -> Result<Vec<FileEntry>, StorageError> {
        let token = self.token.clone();
        let session = &mut self.session;
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            records = async {
                session.start(index).await;
                session.snapshot().await
            } => Some(records),
        };

        match snapshot {
            None => {
                self.session.stop();
                Err(StorageError::Cancelled(format!(
                    "channel {} cancelled before the initial listing",
                    self.sink.channel()
                )))
            }
            Some(Err(e)) => {
                self.session.stop();
                self.sink.fail(e.clone());
                Err(e)
            }
            Some(Ok(records)) => Ok(FileEntry::from_records(&self.root, &records)),
        }
    }

    /// Pushes listings on a new task until the subscriber cancels
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let channel = self.sink.channel().clone();
        info!(channel = %channel, root = %self.root, "Live gather started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(channel = %channel, "Live gather cancelled");
                    break;
                }
                event = self.session.next() => event,
            };

            let Some(event) = event else {
                info!(channel = %channel, "Index ended the live gather");
                self.sink.complete();
                break;
            };

            match records_of(event) {
                Ok(records) => {
                    let files = FileEntry::from_records(&self.root, &records);
                    debug!(channel = %channel, files = files.len(), "Listing changed");
                    self.sink.emit(ChannelEvent::Listing(files));
                }
                Err(e) => {
                    self.sink.fail(e);
                    break;
                }
            }
        }

        self.session.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use icloud_storage_core::domain::IndexRecord;
    use icloud_storage_core::ports::{IndexNotification, IndexWatch, WatchHandle};
    use tokio::sync::mpsc;

    use super::*;

    struct FixedIndex {
        records: Vec<IndexRecord>,
        // Keeps the watch open for the lifetime of the index
        senders: Mutex<Vec<mpsc::UnboundedSender<IndexNotification>>>,
    }

    #[async_trait::async_trait]
    impl ISyncIndex for FixedIndex {
        async fn query(&self, _scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>> {
            Ok(self.records.clone())
        }

        async fn watch(&self, _scope: &QueryScope) -> anyhow::Result<IndexWatch> {
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(IndexNotification::FinishedGathering(self.records.clone()))?;
            self.senders.lock().unwrap().push(tx);
            Ok(IndexWatch {
                notifications: rx,
                handle: WatchHandle::noop(),
            })
        }

        async fn start_downloading(&self, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_gather_once_skips_directories_and_root() {
        let mut file = IndexRecord::new("/c/a.txt");
        file.size = Some(10);
        let index = FixedIndex {
            records: vec![
                IndexRecord::new("/c/"),
                IndexRecord::new("/c/b/"),
                file,
                IndexRecord::new("/other/x.txt"),
            ],
            senders: Mutex::new(Vec::new()),
        };
        let root = ContainerRoot::new("/c").unwrap();

        let files = gather_once(&index, &root).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "a.txt");
        assert_eq!(files[0].size_in_bytes, Some(10));
    }
}
