//! Index records and the file entries derived from them
//!
//! [`IndexRecord`] is the raw shape the sync index reports for one tracked
//! item. [`FileEntry`] is the reporting structure handed to callers: it is
//! derived from a record relative to a container root and never exists for
//! directory markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ContainerRoot;

// ============================================================================
// DownloadStatus
// ============================================================================

/// Local residency of a remote item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadStatus {
    /// Only a placeholder exists locally
    #[default]
    NotDownloaded,
    /// A local copy exists but a newer version is available remotely
    Downloaded,
    /// The local copy matches the most recent remote version
    Current,
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::NotDownloaded => "notDownloaded",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Current => "current",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// IndexRecord
// ============================================================================

/// One item as reported by the sync index
///
/// `path` is the absolute location of the item. Directory markers are
/// reported with a trailing `/`, mirroring how the platform index renders
/// directory URLs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexRecord {
    pub path: String,
    pub size: Option<u64>,
    pub creation_time: Option<DateTime<Utc>>,
    pub content_change_time: Option<DateTime<Utc>>,
    pub has_unresolved_conflicts: bool,
    pub download_status: DownloadStatus,
    pub is_downloading: bool,
    pub is_uploaded: bool,
    pub is_uploading: bool,
    /// Upload progress in percent, when the index reports one
    pub percent_uploaded: Option<f64>,
    /// Download progress in percent, when the index reports one
    pub percent_downloaded: Option<f64>,
    /// Last upload failure reported for this item
    pub upload_error: Option<String>,
    /// Last download failure reported for this item
    pub download_error: Option<String>,
}

impl IndexRecord {
    /// Creates a record for `path` with every attribute unset
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Returns true if this record is a directory marker
    pub fn is_directory_marker(&self) -> bool {
        self.path.ends_with('/')
    }
}

// ============================================================================
// FileEntry
// ============================================================================

/// A file inside a container, as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub relative_path: String,
    pub size_in_bytes: Option<u64>,
    pub creation_time: Option<DateTime<Utc>>,
    pub content_change_time: Option<DateTime<Utc>>,
    pub has_unresolved_conflicts: bool,
    pub download_status: DownloadStatus,
    pub is_downloading: bool,
    pub is_uploaded: bool,
    pub is_uploading: bool,
}

impl FileEntry {
    /// Derives an entry from a raw record
    ///
    /// Returns `None` for directory markers, for the root itself, and for
    /// records outside `root`.
    pub fn from_record(root: &ContainerRoot, record: &IndexRecord) -> Option<Self> {
        if record.is_directory_marker() {
            return None;
        }
        let relative_path = root.relativize(&record.path)?;

        Some(Self {
            relative_path: relative_path.to_string(),
            size_in_bytes: record.size,
            creation_time: record.creation_time,
            content_change_time: record.content_change_time,
            has_unresolved_conflicts: record.has_unresolved_conflicts,
            download_status: record.download_status,
            is_downloading: record.is_downloading,
            is_uploaded: record.is_uploaded,
            is_uploading: record.is_uploading,
        })
    }

    /// Maps a full result set to entries, dropping everything that is not a file
    pub fn from_records(root: &ContainerRoot, records: &[IndexRecord]) -> Vec<Self> {
        records
            .iter()
            .filter_map(|record| Self::from_record(root, record))
            .collect()
    }
}
