//! Storage operation facade.
//!
//! [`StorageService`] owns the [`WatchRegistry`] and the three ports and
//! exposes the operation surface: channel management, gather, upload,
//! download, delete and move.
//!
//! ## Ordering
//!
//! Every operation resolves its container first. Operations that feed a
//! channel then attach to it, which fails with `ChannelNotFound` before any
//! side effect happens. Only then is the filesystem touched and, where a
//! channel is present, a monitor spawned.

use std::path::Path;
use std::sync::Arc;

use icloud_storage_core::config::StallFallbackConfig;
use icloud_storage_core::domain::{Channel, ContainerId, FileEntry, RelativePath, StorageError};
use icloud_storage_core::ports::{IContainerResolver, IFileCoordinator, ISyncIndex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::monitors::{gather_once, DownloadMonitor, GatherMonitor, UploadMonitor};
use crate::registry::{ChannelSink, EventStream, WatchRegistry};
use crate::transfer;

/// Storage operations over one index, resolver and filesystem
pub struct StorageService {
    index: Arc<dyn ISyncIndex>,
    resolver: Arc<dyn IContainerResolver>,
    fs: Arc<dyn IFileCoordinator>,
    registry: WatchRegistry,
    stall_fallback: StallFallbackConfig,
}

impl StorageService {
    /// Creates a service with the default stall fallback policy
    pub fn new(
        index: Arc<dyn ISyncIndex>,
        resolver: Arc<dyn IContainerResolver>,
        fs: Arc<dyn IFileCoordinator>,
    ) -> Self {
        Self {
            index,
            resolver,
            fs,
            registry: WatchRegistry::new(),
            stall_fallback: StallFallbackConfig::default(),
        }
    }

    /// Replaces the upload stall fallback policy
    #[must_use]
    pub fn with_stall_fallback(mut self, policy: StallFallbackConfig) -> Self {
        self.stall_fallback = policy;
        self
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Registers a channel for a later operation to feed
    ///
    /// # Errors
    /// Returns `StorageError::DuplicateChannel` if the name is in use.
    pub fn create_channel(&self, channel: &Channel) -> Result<EventStream, StorageError> {
        self.registry.register(channel)
    }

    /// Cancels whatever feeds `channel` and frees the name
    pub fn cancel_channel(&self, channel: &Channel) {
        self.registry.unregister(channel);
    }

    /// Attaches a new operation to `channel`, returning its sink and token
    fn attach(&self, channel: &Channel) -> Result<(ChannelSink, CancellationToken), StorageError> {
        let token = CancellationToken::new();
        let on_cancel = token.clone();
        let sink = self.registry.attach(channel, move || on_cancel.cancel())?;
        Ok((sink, token))
    }

    // ========================================================================
    // Gather
    // ========================================================================

    /// Lists every file in the container
    ///
    /// With a channel, later changes are pushed to it as full listings until
    /// the subscriber cancels.
    ///
    /// # Errors
    /// - `StorageError::Container` if the container cannot be resolved
    /// - `StorageError::ChannelNotFound` if `channel` is not registered
    /// - `StorageError::Cancelled` if the subscriber cancels before the first listing
    /// - `StorageError::Native` if the index fails
    pub async fn gather(
        &self,
        container: &ContainerId,
        channel: Option<&Channel>,
    ) -> Result<Vec<FileEntry>, StorageError> {
        let root = self.resolver.resolve(container)?;

        let Some(channel) = channel else {
            return gather_once(self.index.as_ref(), &root).await;
        };

        let (sink, token) = self.attach(channel)?;
        let mut monitor = GatherMonitor::new(sink, root, token);
        let files = monitor.initial_listing(self.index.as_ref()).await?;
        monitor.spawn();

        info!(container = %container, channel = %channel, files = files.len(), "Live gather attached");
        Ok(files)
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Copies `local` into the container at `cloud`, replacing any existing item
    ///
    /// With a channel, upload progress is reported on it. The call returns
    /// once the copy is done; it does not wait for the upload.
    ///
    /// # Errors
    /// - `StorageError::Container` if the container cannot be resolved
    /// - `StorageError::ChannelNotFound` if `channel` is not registered
    /// - `StorageError::Native` if the copy fails (the channel is failed too)
    pub async fn upload(
        &self,
        container: &ContainerId,
        local: &Path,
        cloud: &RelativePath,
        channel: Option<&Channel>,
    ) -> Result<(), StorageError> {
        let root = self.resolver.resolve(container)?;
        let cloud_path = root.join(cloud);
        let attached = channel.map(|c| self.attach(c)).transpose()?;

        let size = match transfer::copy_into_container(self.fs.as_ref(), local, &cloud_path).await {
            Ok(size) => size,
            Err(e) => {
                warn!(container = %container, path = %cloud, error = %e, "Upload copy failed");
                if let Some((sink, _)) = &attached {
                    sink.fail(e.clone());
                }
                return Err(e);
            }
        };

        if let Some((sink, token)) = attached {
            let stall_delay = self.stall_fallback.delay_for(size);
            UploadMonitor::new(sink, &cloud_path, token, stall_delay).spawn(Arc::clone(&self.index));
        }

        info!(container = %container, path = %cloud, size, "Upload started");
        Ok(())
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Materializes `cloud` locally and copies it to `local` once current
    ///
    /// Progress, completion and failures are reported on `channel`. If the
    /// provider rejects the download request the error is returned, but the
    /// channel is still monitored.
    ///
    /// # Errors
    /// - `StorageError::Container` if the container cannot be resolved
    /// - `StorageError::ChannelNotFound` if `channel` is not registered
    /// - `StorageError::Native` if the download request is rejected
    pub async fn download(
        &self,
        container: &ContainerId,
        cloud: &RelativePath,
        local: &Path,
        channel: &Channel,
    ) -> Result<(), StorageError> {
        let root = self.resolver.resolve(container)?;
        let cloud_path = root.join(cloud);
        let (sink, token) = self.attach(channel)?;

        let requested = transfer::request_download(self.index.as_ref(), &cloud_path).await;

        DownloadMonitor::new(sink, &cloud_path, local, token, Arc::clone(&self.fs))
            .spawn(Arc::clone(&self.index));

        info!(container = %container, path = %cloud, channel = %channel, "Download started");
        requested
    }

    // ========================================================================
    // Delete / Move
    // ========================================================================

    /// Removes the item at `cloud` (directories recursively)
    ///
    /// # Errors
    /// - `StorageError::Container` if the container cannot be resolved
    /// - `StorageError::FileNotFound` if nothing exists at `cloud`
    /// - `StorageError::Native` if the removal fails
    pub async fn delete(
        &self,
        container: &ContainerId,
        cloud: &RelativePath,
    ) -> Result<(), StorageError> {
        let root = self.resolver.resolve(container)?;
        let path = root.join(cloud);

        let _guard = self.fs.coordinate(&[path.clone()]).await?;
        if !self.fs.exists(&path).await? {
            return Err(StorageError::FileNotFound(cloud.to_string()));
        }
        self.fs.remove(&path).await?;

        info!(container = %container, path = %cloud, "Deleted");
        Ok(())
    }

    /// Moves the item at `from` to `to`, creating missing parent directories
    ///
    /// # Errors
    /// - `StorageError::Container` if the container cannot be resolved
    /// - `StorageError::Native` if the move fails
    pub async fn move_item(
        &self,
        container: &ContainerId,
        from: &RelativePath,
        to: &RelativePath,
    ) -> Result<(), StorageError> {
        let root = self.resolver.resolve(container)?;
        let from_path = root.join(from);
        let to_path = root.join(to);

        let _guard = self
            .fs
            .coordinate(&[from_path.clone(), to_path.clone()])
            .await?;
        if let Some(parent) = to_path.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        self.fs.rename(&from_path, &to_path).await?;

        info!(container = %container, from = %from, to = %to, "Moved");
        Ok(())
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("registry", &self.registry)
            .field("stall_fallback", &self.stall_fallback)
            .finish_non_exhaustive()
    }
}
