//! Config-backed container resolver (secondary/driven adapter)
//!
//! Resolves container identifiers through a fixed id → directory map, as
//! configured under `containers:` in the YAML configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use icloud_storage_core::config::Config;
use icloud_storage_core::domain::{ContainerId, ContainerRoot, StorageError};
use icloud_storage_core::ports::IContainerResolver;
use tracing::debug;

/// Resolver over a static map of container roots
#[derive(Debug, Clone, Default)]
pub struct MappedContainerResolver {
    roots: BTreeMap<String, PathBuf>,
}

impl MappedContainerResolver {
    pub fn new(roots: BTreeMap<String, PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.containers.clone())
    }

    /// Adds or replaces one mapping
    #[must_use]
    pub fn with_container(mut self, id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(id.into(), root.into());
        self
    }
}

impl IContainerResolver for MappedContainerResolver {
    fn resolve(&self, id: &ContainerId) -> Result<ContainerRoot, StorageError> {
        let Some(root) = self.roots.get(id.as_str()) else {
            return Err(StorageError::Container(format!("unknown container {id}")));
        };
        if !root.is_dir() {
            return Err(StorageError::Container(format!(
                "container {id} root is not a directory: {}",
                root.display()
            )));
        }
        debug!(container = %id, root = %root.display(), "Resolved container");
        ContainerRoot::new(root.clone())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_resolves_configured_directory() {
        let dir = TempDir::new().unwrap();
        let resolver = MappedContainerResolver::default().with_container("iCloud.test", dir.path());

        let root = resolver
            .resolve(&ContainerId::new("iCloud.test").unwrap())
            .unwrap();
        assert_eq!(root.as_path(), dir.path());
    }

    #[test]
    fn test_unknown_container_is_container_error() {
        let resolver = MappedContainerResolver::default();
        let err = resolver
            .resolve(&ContainerId::new("iCloud.missing").unwrap())
            .unwrap_err();
        assert_eq!(err.code(), "E_CTR");
    }

    #[test]
    fn test_missing_directory_is_container_error() {
        let dir = TempDir::new().unwrap();
        let resolver =
            MappedContainerResolver::default().with_container("iCloud.test", dir.path().join("gone"));
        let err = resolver
            .resolve(&ContainerId::new("iCloud.test").unwrap())
            .unwrap_err();
        assert_eq!(err.code(), "E_CTR");
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let config = icloud_storage_core::config::ConfigBuilder::new()
            .container("iCloud.test", dir.path())
            .build();
        let resolver = MappedContainerResolver::from_config(&config);
        assert!(resolver
            .resolve(&ContainerId::new("iCloud.test").unwrap())
            .is_ok());
    }
}
