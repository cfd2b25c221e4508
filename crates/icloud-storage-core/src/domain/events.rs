//! Events delivered on a channel
//!
//! A channel carries zero or more [`ChannelEvent::Progress`] or
//! [`ChannelEvent::Listing`] events followed by exactly one terminal event
//! (`Error` or `EndOfStream`), unless the subscriber cancels first.

use serde::Serialize;

use super::errors::StorageError;
use super::file_entry::FileEntry;

/// Transfer progress as a percentage in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Progress(f64);

impl Progress {
    /// Creates a Progress, clamping into `[0, 100]`
    ///
    /// NaN is treated as 0.
    #[must_use]
    pub fn new(percent: f64) -> Self {
        if percent.is_nan() {
            return Self(0.0);
        }
        Self(percent.clamp(0.0, 100.0))
    }

    /// Returns the percentage
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.0
    }

    /// Returns true once the transfer reports 100%
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0 >= 100.0
    }
}

/// One item delivered to a channel's subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Upload or download progress
    Progress(Progress),
    /// Full recomputed listing of a gathered container
    Listing(Vec<FileEntry>),
    /// Terminal: the operation failed
    Error(StorageError),
    /// Terminal: the operation finished
    EndOfStream,
}

impl ChannelEvent {
    /// Returns true for `Error` and `EndOfStream`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelEvent::Error(_) | ChannelEvent::EndOfStream)
    }

    /// JSON representation used by the CLI's `--json` output
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChannelEvent::Progress(p) => serde_json::json!({ "progress": p.percent() }),
            ChannelEvent::Listing(files) => serde_json::json!({ "files": files }),
            ChannelEvent::Error(e) => serde_json::json!({ "error": e.to_json() }),
            ChannelEvent::EndOfStream => serde_json::json!({ "done": true }),
        }
    }
}
