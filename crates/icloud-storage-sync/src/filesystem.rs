//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`IFileCoordinator`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **No implicit overwrite**: `copy` refuses an existing destination; the
//!   operation layer removes it first when it means to replace.
//! - **Coordination**: mutations are serialized per path inside this
//!   process. Locks are taken in sorted order so two coordinated mutations
//!   over overlapping path sets cannot deadlock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use dashmap::DashMap;
use icloud_storage_core::ports::{CoordinationGuard, IFileCoordinator};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

// ============================================================================
// LocalFileCoordinator struct
// ============================================================================

/// Adapter that bridges the [`IFileCoordinator`] port to the real filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFileCoordinator {
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LocalFileCoordinator {
    /// Create a new `LocalFileCoordinator`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Copies a directory tree; `to` must not exist
async fn copy_tree(from: &Path, to: &Path) -> anyhow::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

// ============================================================================
// IFileCoordinator implementation
// ============================================================================

#[async_trait::async_trait]
impl IFileCoordinator for LocalFileCoordinator {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn exists(&self, path: &Path) -> anyhow::Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn file_size(&self, path: &Path) -> anyhow::Result<u64> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        Ok(metadata.len())
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn copy(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        if tokio::fs::try_exists(to).await? {
            bail!("destination already exists: {}", to.display());
        }
        let metadata = tokio::fs::metadata(from)
            .await
            .with_context(|| format!("Failed to stat {}", from.display()))?;

        if metadata.is_dir() {
            debug!("copying directory tree");
            copy_tree(from, to).await?;
        } else {
            let bytes = tokio::fs::copy(from, to).await?;
            debug!(bytes, "copy complete");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        let metadata = tokio::fs::symlink_metadata(path).await?;

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        tokio::fs::rename(from, to)
            .await
            .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn coordinate(&self, paths: &[PathBuf]) -> anyhow::Result<CoordinationGuard> {
        let mut ordered: Vec<&PathBuf> = paths.iter().collect();
        ordered.sort();
        ordered.dedup();

        let ordered: Vec<PathBuf> = ordered.into_iter().cloned().collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for path in &ordered {
            let lock = Arc::clone(self.locks.entry(path.clone()).or_default().value());
            guards.push(lock.lock_owned().await);
        }

        // Forget a path's lock once no guard or waiter holds it
        let locks = Arc::clone(&self.locks);
        Ok(CoordinationGuard::new(guards).on_release(move || {
            for path in &ordered {
                locks.remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
            }
        }))
    }
}
