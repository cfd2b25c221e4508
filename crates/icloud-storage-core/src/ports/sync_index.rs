//! Sync index port (driven/secondary port)
//!
//! This module defines the interface to the external index of
//! remote-tracked files. The index is eventually consistent and mutated
//! outside this process: items appear, disappear, transfer and fail on
//! their own schedule. The engine only queries and watches it.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because index failures are adapter-specific.
//! - A watch delivers full result sets, never diffs: every notification
//!   carries the complete current set of records matching the scope.
//! - [`IndexWatch`] owns an RAII [`WatchHandle`]; dropping it stops the
//!   underlying native subscription.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::domain::file_entry::IndexRecord;

// ============================================================================
// QueryScope
// ============================================================================

/// Path predicate applied to index records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPredicate {
    /// Every item whose location begins with the given path
    PathPrefix(PathBuf),
    /// The single item at exactly the given path
    PathEquals(PathBuf),
}

/// Index partitions a query searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Items stored outside the container's `Documents` folder
    UbiquitousData,
    /// Items stored inside the container's `Documents` folder
    UbiquitousDocuments,
}

/// A predicate plus the partitions it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    pub predicate: QueryPredicate,
    pub search_scopes: Vec<SearchScope>,
}

impl QueryScope {
    /// Matches every item under `root`, across both search scopes
    pub fn prefix(root: impl Into<PathBuf>) -> Self {
        Self {
            predicate: QueryPredicate::PathPrefix(root.into()),
            search_scopes: vec![SearchScope::UbiquitousData, SearchScope::UbiquitousDocuments],
        }
    }

    /// Matches the single item at `path`, across both search scopes
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        Self {
            predicate: QueryPredicate::PathEquals(path.into()),
            search_scopes: vec![SearchScope::UbiquitousData, SearchScope::UbiquitousDocuments],
        }
    }

    /// Returns the path the predicate is anchored on
    pub fn anchor(&self) -> &Path {
        match &self.predicate {
            QueryPredicate::PathPrefix(p) | QueryPredicate::PathEquals(p) => p,
        }
    }

    /// Returns true if an index location satisfies the predicate
    ///
    /// A trailing `/` on directory markers is ignored for exact matches.
    pub fn matches(&self, location: &str) -> bool {
        match &self.predicate {
            QueryPredicate::PathPrefix(prefix) => prefix
                .to_str()
                .is_some_and(|prefix| location.starts_with(prefix)),
            QueryPredicate::PathEquals(path) => {
                let trimmed = if location.len() > 1 {
                    location.trim_end_matches('/')
                } else {
                    location
                };
                path.to_str().is_some_and(|path| trimmed == path)
            }
        }
    }
}

// ============================================================================
// IndexNotification
// ============================================================================

/// A notification from a continuous index watch
#[derive(Debug, Clone, PartialEq)]
pub enum IndexNotification {
    /// The initial enumeration finished; carries the full result set
    FinishedGathering(Vec<IndexRecord>),
    /// The watched set changed; carries the full current result set
    Updated(Vec<IndexRecord>),
}

// ============================================================================
// WatchHandle
// ============================================================================

/// RAII handle for an active index watch
///
/// When this handle is dropped, the associated native subscription is
/// stopped and its resources are released.
pub struct WatchHandle {
    /// Callback to invoke when the handle is dropped to stop the watch
    stop_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    /// Creates a new WatchHandle with the given stop callback
    ///
    /// The callback will be invoked exactly once, on `stop` or on drop.
    pub fn new(stop_fn: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop_fn: Some(Box::new(stop_fn)),
        }
    }

    /// Creates a handle with nothing to stop
    pub fn noop() -> Self {
        Self { stop_fn: None }
    }

    /// Explicitly stops the watch, consuming the handle
    pub fn stop(mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.stop_fn.is_some())
            .finish()
    }
}

/// A live index watch: a notification stream plus the handle that stops it
#[derive(Debug)]
pub struct IndexWatch {
    pub notifications: mpsc::UnboundedReceiver<IndexNotification>,
    pub handle: WatchHandle,
}

// ============================================================================
// ISyncIndex trait
// ============================================================================

/// Port trait for the external index of remote-tracked files
///
/// ## Implementation Notes
///
/// - `watch` must deliver `FinishedGathering` before any `Updated`.
/// - Notifications must be delivered in the order the index produces them.
/// - Closing the notification sender signals that the index ended the watch.
#[async_trait::async_trait]
pub trait ISyncIndex: Send + Sync {
    /// Returns the records currently matching `scope`
    async fn query(&self, scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>>;

    /// Opens a continuous watch over `scope`
    async fn watch(&self, scope: &QueryScope) -> anyhow::Result<IndexWatch>;

    /// Asks the sync provider to materialize the remote item at `path` locally
    ///
    /// Fire-and-forget: returns once the request is accepted, not when the
    /// content is resident.
    async fn start_downloading(&self, path: &Path) -> anyhow::Result<()>;
}
