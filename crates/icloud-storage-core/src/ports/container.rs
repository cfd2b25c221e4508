//! Container resolution port (driven/secondary port)
//!
//! Given a container identifier, the platform hands back the local root
//! under which the container's files are visible, or refuses because the
//! user is not signed in, has disabled the permission, or the identifier is
//! unknown. Resolution is synchronous and cheap.

use crate::domain::{errors::StorageError, newtypes::ContainerId, newtypes::ContainerRoot};

/// Port trait for resolving container identifiers to roots
pub trait IContainerResolver: Send + Sync {
    /// Resolves `id` to its root
    ///
    /// # Errors
    /// Returns `StorageError::Container` when the container is unavailable
    fn resolve(&self, id: &ContainerId) -> Result<ContainerRoot, StorageError>;
}
