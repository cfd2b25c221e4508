//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the engine depends on but whose implementations
//! live in adapter code.
//!
//! ## Ports Overview
//!
//! - [`ISyncIndex`] - Query and watch the external index of tracked files
//! - [`IContainerResolver`] - Resolve container identifiers to roots
//! - [`IFileCoordinator`] - Filesystem primitives and coordinated mutation

pub mod container;
pub mod file_coordinator;
pub mod sync_index;

pub use container::IContainerResolver;
pub use file_coordinator::{CoordinationGuard, IFileCoordinator};
pub use sync_index::{
    ISyncIndex, IndexNotification, IndexWatch, QueryPredicate, QueryScope, SearchScope,
    WatchHandle,
};
