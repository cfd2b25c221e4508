//! Domain entities
//!
//! This module contains the core domain types:
//! - Newtypes for container identifiers, channels and paths
//! - Index records and the file entries derived from them
//! - Channel events and progress values
//! - The storage error taxonomy

pub mod errors;
pub mod events;
pub mod file_entry;
pub mod newtypes;

// Re-export commonly used types
pub use errors::StorageError;
pub use events::{ChannelEvent, Progress};
pub use file_entry::{DownloadStatus, FileEntry, IndexRecord};
pub use newtypes::*;
