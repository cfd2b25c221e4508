//! Directory-backed sync index (secondary/driven adapter)
//!
//! Implements [`ISyncIndex`] over a plain directory tree, for development
//! and for the CLI. Every file on disk is reported as fully transferred:
//! uploaded, downloaded and current. Watches are backed by `notify` and
//! re-enumerate the whole scope on every filesystem event, so each
//! notification carries the full result set.
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  RecommendedWatcher ──→ tick ──→ rescan task ──→ IndexNotification::Updated
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use icloud_storage_core::domain::{DownloadStatus, IndexRecord};
use icloud_storage_core::ports::{
    ISyncIndex, IndexNotification, IndexWatch, QueryPredicate, QueryScope, WatchHandle,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Sync index over the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalDirectoryIndex;

impl LocalDirectoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// Enumeration
// ============================================================================

fn timestamp(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

/// Builds the record for one existing path
fn record_for(path: &Path, metadata: &std::fs::Metadata) -> IndexRecord {
    let location = path.to_string_lossy();
    let mut record = if metadata.is_dir() {
        IndexRecord::new(format!("{}/", location.trim_end_matches('/')))
    } else {
        let mut record = IndexRecord::new(location.into_owned());
        record.size = Some(metadata.len());
        record
    };
    record.creation_time = timestamp(metadata.created());
    record.content_change_time = timestamp(metadata.modified());
    record.download_status = DownloadStatus::Current;
    record.is_uploaded = true;
    record.percent_uploaded = Some(100.0);
    record.percent_downloaded = Some(100.0);
    record
}

/// Returns every record matching `scope`, in a stable order
async fn enumerate(scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>> {
    let mut records = Vec::new();

    match &scope.predicate {
        QueryPredicate::PathEquals(path) => {
            if let Ok(metadata) = tokio::fs::metadata(path).await {
                records.push(record_for(path, &metadata));
            }
        }
        QueryPredicate::PathPrefix(root) => {
            let metadata = tokio::fs::metadata(root)
                .await
                .with_context(|| format!("Failed to stat index root {}", root.display()))?;
            records.push(record_for(root, &metadata));

            let mut pending = vec![root.clone()];
            while let Some(dir) = pending.pop() {
                let mut entries = tokio::fs::read_dir(&dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    // Entries can vanish between listing and stat
                    let Ok(metadata) = entry.metadata().await else {
                        continue;
                    };
                    if metadata.is_dir() {
                        pending.push(path.clone());
                    }
                    records.push(record_for(&path, &metadata));
                }
            }
        }
    }

    records.retain(|record| scope.matches(&record.path));
    records.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(records)
}

// ============================================================================
// Watching
// ============================================================================

/// Directory to hand to `notify` for a scope, and how deep to watch it
fn watch_target(scope: &QueryScope) -> (PathBuf, RecursiveMode) {
    match &scope.predicate {
        QueryPredicate::PathPrefix(root) => (root.clone(), RecursiveMode::Recursive),
        // The item itself may not exist yet, so watch its directory
        QueryPredicate::PathEquals(path) => (
            path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.clone()),
            RecursiveMode::NonRecursive,
        ),
    }
}

/// Re-enumerates `scope` on every tick until cancelled or the watch is dropped
async fn rescan_loop(
    scope: QueryScope,
    mut ticks: mpsc::UnboundedReceiver<()>,
    notifications: mpsc::UnboundedSender<IndexNotification>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
            }
        }
        // Coalesce bursts into one rescan
        while ticks.try_recv().is_ok() {}

        match enumerate(&scope).await {
            Ok(records) => {
                debug!(anchor = %scope.anchor().display(), records = records.len(), "Rescanned watched scope");
                if notifications.send(IndexNotification::Updated(records)).is_err() {
                    break;
                }
            }
            Err(e) => warn!(anchor = %scope.anchor().display(), error = %e, "Rescan failed"),
        }
    }
    debug!(anchor = %scope.anchor().display(), "Rescan loop stopped");
}

// ============================================================================
// ISyncIndex implementation
// ============================================================================

#[async_trait::async_trait]
impl ISyncIndex for LocalDirectoryIndex {
    #[instrument(skip(self), fields(anchor = %scope.anchor().display()))]
    async fn query(&self, scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>> {
        enumerate(scope).await
    }

    #[instrument(skip(self), fields(anchor = %scope.anchor().display()))]
    async fn watch(&self, scope: &QueryScope) -> anyhow::Result<IndexWatch> {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) if !event.kind.is_access() => {
                    let _ = tick_tx.send(());
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "Directory watcher error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create directory watcher")?;

        let (target, mode) = watch_target(scope);
        watcher
            .watch(&target, mode)
            .with_context(|| format!("Failed to watch {}", target.display()))?;

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        notify_tx.send(IndexNotification::FinishedGathering(enumerate(scope).await?))?;

        let token = CancellationToken::new();
        tokio::spawn(rescan_loop(
            scope.clone(),
            tick_rx,
            notify_tx,
            token.clone(),
        ));

        info!(path = %target.display(), "Watching directory");
        let handle = WatchHandle::new(move || {
            token.cancel();
            drop(watcher);
        });

        Ok(IndexWatch {
            notifications: notify_rx,
            handle,
        })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn start_downloading(&self, path: &Path) -> anyhow::Result<()> {
        if !tokio::fs::try_exists(path).await? {
            bail!("no such item: {}", path.display());
        }
        debug!("item already resident");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn location(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_query_prefix_lists_files_and_directory_markers() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"0123456789").await.unwrap();
        tokio::fs::create_dir(dir.path().join("b")).await.unwrap();

        let index = LocalDirectoryIndex::new();
        let records = index.query(&QueryScope::prefix(dir.path())).await.unwrap();

        let file = records
            .iter()
            .find(|r| r.path == location(&dir.path().join("a.txt")))
            .unwrap();
        assert_eq!(file.size, Some(10));
        assert_eq!(file.download_status, DownloadStatus::Current);
        assert!(file.is_uploaded);

        let marker = format!("{}/", location(&dir.path().join("b")));
        assert!(records.iter().any(|r| r.path == marker && r.is_directory_marker()));
    }

    #[tokio::test]
    async fn test_query_exact_missing_item_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = LocalDirectoryIndex::new();
        let records = index
            .query(&QueryScope::exact(dir.path().join("missing.txt")))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_start_downloading_requires_existing_item() {
        let dir = TempDir::new().unwrap();
        let index = LocalDirectoryIndex::new();
        assert!(index
            .start_downloading(&dir.path().join("missing.txt"))
            .await
            .is_err());

        tokio::fs::write(dir.path().join("here.txt"), b"x").await.unwrap();
        assert!(index
            .start_downloading(&dir.path().join("here.txt"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_watch_delivers_snapshot_then_update() {
        let dir = TempDir::new().unwrap();
        let index = LocalDirectoryIndex::new();
        let mut watch = index.watch(&QueryScope::prefix(dir.path())).await.unwrap();

        match watch.notifications.recv().await {
            Some(IndexNotification::FinishedGathering(records)) => {
                assert!(records.iter().all(|r| r.is_directory_marker()));
            }
            other => panic!("expected initial gathering, got {other:?}"),
        }

        let created = dir.path().join("new.txt");
        tokio::fs::write(&created, b"hi").await.unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match watch.notifications.recv().await {
                    Some(IndexNotification::Updated(records))
                        if records.iter().any(|r| r.path == location(&created)) =>
                    {
                        return records;
                    }
                    Some(_) => continue,
                    None => panic!("watch closed"),
                }
            }
        })
        .await
        .unwrap();
        assert!(!update.is_empty());
    }
}
