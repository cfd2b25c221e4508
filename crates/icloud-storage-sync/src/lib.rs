//! iCloud Storage Sync - Sync-state observation engine
//!
//! Turns an eventually-consistent, externally mutated file index into
//! ordered, terminating, individually cancellable event streams, one per
//! logical operation.
//!
//! ## Modules
//!
//! - [`registry`] - Channel → subscription registry (`WatchRegistry`, `EventStream`)
//! - [`session`] - Pull-based query session over one index watch
//! - [`monitors`] - Gather, upload and download monitors
//! - [`transfer`] - Copies and download requests performed before monitoring
//! - [`service`] - `StorageService`, the operation facade
//! - [`dispatch`] - Method-call decoding and dispatch
//!
//! ## Adapters
//!
//! - [`filesystem`] - `LocalFileCoordinator` over `tokio::fs`
//! - [`local_index`] - `LocalDirectoryIndex`, a `notify`-backed index over a directory tree
//! - [`container`] - `MappedContainerResolver`, container roots from configuration

pub mod container;
pub mod dispatch;
pub mod filesystem;
pub mod local_index;
pub mod monitors;
pub mod registry;
pub mod service;
pub mod session;
pub mod transfer;

pub use dispatch::{Dispatcher, MethodCall, Reply, Request};
pub use registry::{ChannelSink, EventStream, WatchRegistry};
pub use service::StorageService;
pub use session::{QuerySession, SessionEvent, SessionState};
