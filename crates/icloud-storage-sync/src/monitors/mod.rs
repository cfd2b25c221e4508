//! Operation monitors.
//!
//! Each monitor owns one [`QuerySession`](crate::session::QuerySession) and
//! runs as a spawned task, turning raw index notifications into the event
//! sequence of one operation:
//!
//! - [`gather`] - container listings, one-shot or live
//! - [`upload`] - upload progress with the stall fallback
//! - [`download`] - download progress and the final copy out of the container
//!
//! Every monitor selects on its `CancellationToken` first, so a cancelled
//! channel receives nothing further.

pub mod download;
pub mod gather;
pub mod upload;

pub use download::DownloadMonitor;
pub use gather::{gather_once, GatherMonitor};
pub use upload::UploadMonitor;

use icloud_storage_core::domain::{IndexRecord, StorageError};

use crate::session::SessionEvent;

/// Outcome of handling one result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

/// Flattens a session event into its result set
fn records_of(event: SessionEvent) -> Result<Vec<IndexRecord>, StorageError> {
    match event {
        SessionEvent::Snapshot(result) => result,
        SessionEvent::Update(records) => Ok(records),
    }
}
