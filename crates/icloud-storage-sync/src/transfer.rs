//! Side effects performed before a transfer is monitored.
//!
//! Uploads copy the local source into the container; downloads ask the index
//! to materialize the remote item and later copy it back out. Both replace
//! the destination instead of merging into it.

use std::path::{Path, PathBuf};

use icloud_storage_core::domain::StorageError;
use icloud_storage_core::ports::{IFileCoordinator, ISyncIndex};
use tracing::{debug, info, warn};

/// Copies a local file into the container, replacing any existing item
///
/// Returns the size of the local source, measured before the copy.
///
/// # Errors
/// Returns `StorageError::Native` for any filesystem failure.
pub async fn copy_into_container(
    fs: &dyn IFileCoordinator,
    local: &Path,
    cloud: &Path,
) -> Result<u64, StorageError> {
    let size = fs.file_size(local).await?;

    let _guard = fs.coordinate(&[cloud.to_path_buf()]).await?;
    if fs.exists(cloud).await? {
        debug!(path = %cloud.display(), "Replacing existing cloud item");
        fs.remove(cloud).await?;
    } else if let Some(parent) = cloud.parent() {
        if !fs.exists(parent).await? {
            fs.create_dir_all(parent).await?;
        }
    }
    fs.copy(local, cloud).await?;

    info!(
        from = %local.display(),
        to = %cloud.display(),
        size,
        "Copied local file into container"
    );
    Ok(size)
}

/// Copies a resident cloud item to a local path, replacing any existing file
///
/// # Errors
/// Returns `StorageError::Native` for any filesystem failure.
pub async fn copy_out_of_container(
    fs: &dyn IFileCoordinator,
    cloud: &Path,
    local: &Path,
) -> Result<(), StorageError> {
    let paths: Vec<PathBuf> = vec![cloud.to_path_buf(), local.to_path_buf()];
    let _guard = fs.coordinate(&paths).await?;
    if fs.exists(local).await? {
        fs.remove(local).await?;
    }
    fs.copy(cloud, local).await?;

    info!(
        from = %cloud.display(),
        to = %local.display(),
        "Copied downloaded item out of container"
    );
    Ok(())
}

/// Asks the sync provider to start materializing `cloud` locally
///
/// # Errors
/// Returns `StorageError::Native` if the provider rejects the request.
pub async fn request_download(index: &dyn ISyncIndex, cloud: &Path) -> Result<(), StorageError> {
    index.start_downloading(cloud).await.map_err(|e| {
        warn!(path = %cloud.display(), error = %e, "Download request rejected");
        StorageError::from(e)
    })
}
