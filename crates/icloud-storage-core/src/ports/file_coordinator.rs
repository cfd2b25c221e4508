//! Filesystem primitives port (driven/secondary port)
//!
//! This module defines the raw filesystem operations the engine performs
//! inside a container and on the caller's local paths. Mutations that other
//! processes may race (the sync provider itself, for one) are wrapped in a
//! coordination guard obtained from [`IFileCoordinator::coordinate`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Primitives are deliberately dumb: `copy` does not replace an existing
//!   destination and `rename` does not create parent directories. The
//!   operation layer composes them.

use std::path::{Path, PathBuf};

use tokio::sync::OwnedMutexGuard;

/// Guard held for the duration of a coordinated mutation
///
/// Dropping the guard releases the locks first, then runs the release
/// callback, if any.
#[derive(Default)]
pub struct CoordinationGuard {
    locks: Vec<OwnedMutexGuard<()>>,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CoordinationGuard {
    /// Creates a guard over already-acquired path locks
    pub fn new(locks: Vec<OwnedMutexGuard<()>>) -> Self {
        Self {
            locks,
            on_release: None,
        }
    }

    /// Creates a guard that coordinates nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Runs `on_release` after the locks are released
    #[must_use]
    pub fn on_release(mut self, on_release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(on_release));
        self
    }
}

impl Drop for CoordinationGuard {
    fn drop(&mut self) {
        self.locks.clear();
        if let Some(on_release) = self.on_release.take() {
            on_release();
        }
    }
}

impl std::fmt::Debug for CoordinationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationGuard")
            .field("locks", &self.locks.len())
            .finish()
    }
}

/// Port trait for filesystem primitives
#[async_trait::async_trait]
pub trait IFileCoordinator: Send + Sync {
    /// Returns true if anything exists at `path`
    async fn exists(&self, path: &Path) -> anyhow::Result<bool>;

    /// Returns the size in bytes of the file at `path`
    async fn file_size(&self, path: &Path) -> anyhow::Result<u64>;

    /// Copies the file at `from` to `to`; fails if `to` exists
    async fn copy(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Removes the file or directory (recursively) at `path`
    async fn remove(&self, path: &Path) -> anyhow::Result<()>;

    /// Moves `from` to `to`
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Creates a directory and all missing parents (`mkdir -p`)
    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()>;

    /// Begins a coordinated mutation of `paths`
    ///
    /// Concurrent coordinated mutations touching any of the same paths are
    /// serialized until the returned guard is dropped.
    async fn coordinate(&self, paths: &[PathBuf]) -> anyhow::Result<CoordinationGuard>;
}
