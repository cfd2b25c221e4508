//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the identifiers and paths
//! that cross the operation surface. Each newtype ensures data validity at
//! construction time so that later stages never re-check them.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::StorageError;

// ============================================================================
// ContainerId
// ============================================================================

/// Opaque identifier of a cloud container (e.g. `iCloud.com.example.app`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new ContainerId
    ///
    /// # Errors
    /// Returns `StorageError::Argument` if the identifier is empty
    pub fn new(id: impl Into<String>) -> Result<Self, StorageError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StorageError::Argument(
                "containerId must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Caller-chosen name of one logical event stream
///
/// Channel names are never empty. Requests use an empty string to mean
/// "no channel"; [`Channel::optional`] performs that translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Creates a new Channel
    ///
    /// # Errors
    /// Returns `StorageError::Argument` if the name is empty
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StorageError::Argument(
                "eventChannelName must not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Maps an empty name to `None` and anything else to a Channel
    #[must_use]
    pub fn optional(name: &str) -> Option<Self> {
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    /// Returns the channel name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RelativePath
// ============================================================================

/// A path relative to a container root
///
/// Guaranteed non-empty, relative, free of `.` and `..` segments, and naming
/// at least one entry, so it can never resolve to the container root or
/// escape it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Creates a new RelativePath
    ///
    /// # Errors
    /// Returns `StorageError::Argument` if the path is empty, absolute,
    /// contains a `.` or `..` segment, or names no entry
    pub fn new(path: impl Into<String>) -> Result<Self, StorageError> {
        let path = path.into();
        if path.is_empty() {
            return Err(StorageError::Argument(
                "relative path must not be empty".to_string(),
            ));
        }

        let as_path = Path::new(&path);
        if as_path.is_absolute() || path.starts_with('/') {
            return Err(StorageError::Argument(format!(
                "path must be relative to the container: {path}"
            )));
        }
        // `components()` hides interior `.` segments, so check the raw text too
        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(StorageError::Argument(format!(
                "path must not contain '.' or '..' segments: {path}"
            )));
        }
        if !as_path
            .components()
            .any(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::Argument(format!(
                "path must name an entry inside the container: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Returns the path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

// ============================================================================
// ContainerRoot
// ============================================================================

/// Absolute root location of a resolved container
///
/// Owned by the container resolver; the engine only uses it as a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRoot(PathBuf);

impl ContainerRoot {
    /// Creates a new ContainerRoot
    ///
    /// # Errors
    /// Returns `StorageError::Container` if the path is not absolute
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(StorageError::Container(format!(
                "container root is not absolute: {}",
                path.display()
            )));
        }
        Ok(Self(path))
    }

    /// Returns the root path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Joins a relative path onto the root
    #[must_use]
    pub fn join(&self, relative: &RelativePath) -> PathBuf {
        self.0.join(relative.as_str())
    }

    /// Strips the root prefix from an index location
    ///
    /// Returns `None` when the location is outside the container or is the
    /// root itself.
    #[must_use]
    pub fn relativize<'a>(&self, location: &'a str) -> Option<&'a str> {
        let root = self.0.to_str()?;
        let rest = location.strip_prefix(root)?;
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            None
        } else if root.ends_with('/') || location[root.len()..].starts_with('/') {
            Some(rest)
        } else {
            // Prefix matched part of a sibling name ("/a/box" vs "/a/boxes")
            None
        }
    }
}

impl Display for ContainerRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_rejects_empty() {
        assert!(ContainerId::new("").is_err());
        assert!(ContainerId::new("   ").is_err());
        assert_eq!(
            ContainerId::new("iCloud.test").unwrap().as_str(),
            "iCloud.test"
        );
    }

    #[test]
    fn test_channel_optional() {
        assert!(Channel::optional("").is_none());
        assert_eq!(Channel::optional("ch1").unwrap().as_str(), "ch1");
        assert!(Channel::new("").is_err());
    }

    #[test]
    fn test_relative_path_validation() {
        assert!(RelativePath::new("docs/a.txt").is_ok());
        assert!(RelativePath::new("").is_err());
        assert!(RelativePath::new("/etc/passwd").is_err());
        assert!(RelativePath::new("../escape.txt").is_err());
        assert!(RelativePath::new("a/../../b").is_err());
    }

    #[test]
    fn test_relative_path_cannot_name_the_root() {
        for path in [".", "./", "a/./b", "./a", "a/.", "//"] {
            let err = RelativePath::new(path).unwrap_err();
            assert_eq!(err.code(), "E_ARG", "{path}");
        }
        assert!(RelativePath::new("a/.hidden").is_ok());
        assert!(RelativePath::new("docs/").is_ok());
    }

    #[test]
    fn test_relative_path_deserialize_validates() {
        let ok: RelativePath = serde_json::from_str("\"a/b.txt\"").unwrap();
        assert_eq!(ok.as_str(), "a/b.txt");
        assert!(serde_json::from_str::<RelativePath>("\"../x\"").is_err());
    }

    #[test]
    fn test_container_root_must_be_absolute() {
        assert!(ContainerRoot::new("relative/root").is_err());
        assert!(ContainerRoot::new("/mobile/Documents").is_ok());
    }

    #[test]
    fn test_join() {
        let root = ContainerRoot::new("/cloud/box").unwrap();
        let rel = RelativePath::new("dir/file.txt").unwrap();
        assert_eq!(root.join(&rel), PathBuf::from("/cloud/box/dir/file.txt"));
    }

    #[test]
    fn test_relativize() {
        let root = ContainerRoot::new("/cloud/box").unwrap();
        assert_eq!(root.relativize("/cloud/box/a.txt"), Some("a.txt"));
        assert_eq!(root.relativize("/cloud/box/b/c.txt"), Some("b/c.txt"));
        assert_eq!(root.relativize("/cloud/box"), None);
        assert_eq!(root.relativize("/cloud/box/"), None);
        assert_eq!(root.relativize("/cloud/boxes/a.txt"), None);
        assert_eq!(root.relativize("/elsewhere/a.txt"), None);
    }
}
