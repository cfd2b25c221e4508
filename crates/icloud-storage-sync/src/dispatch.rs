//! Method-call dispatcher.
//!
//! Front ends that speak a name-plus-arguments protocol send a
//! [`MethodCall`]; the dispatcher decodes it into a typed [`Request`],
//! rejecting missing or mistyped arguments with `StorageError::Argument`
//! before anything else happens, and runs it against a [`StorageService`].
//!
//! ## Methods
//!
//! | method | arguments |
//! |--------|-----------|
//! | `gather` | `containerId`, `eventChannelName` |
//! | `upload` | `containerId`, `localFilePath`, `cloudFileName`, `eventChannelName` |
//! | `download` | `containerId`, `cloudFileName`, `localFilePath`, `eventChannelName` |
//! | `delete` | `containerId`, `cloudFileName` |
//! | `move` | `containerId`, `atRelativePath`, `toRelativePath` |
//! | `createEventChannel` | `eventChannelName` |
//!
//! An empty `eventChannelName` means "no channel" where a channel is optional.

use std::path::PathBuf;
use std::sync::Arc;

use icloud_storage_core::domain::{Channel, ContainerId, FileEntry, RelativePath, StorageError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::registry::EventStream;
use crate::service::StorageService;

// ============================================================================
// MethodCall
// ============================================================================

/// An untyped call as received from a front end
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A fully validated call
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Gather {
        container_id: ContainerId,
        channel: Option<Channel>,
    },
    Upload {
        container_id: ContainerId,
        local_path: PathBuf,
        cloud_path: RelativePath,
        channel: Option<Channel>,
    },
    Download {
        container_id: ContainerId,
        cloud_path: RelativePath,
        local_path: PathBuf,
        channel: Channel,
    },
    Delete {
        container_id: ContainerId,
        cloud_path: RelativePath,
    },
    Move {
        container_id: ContainerId,
        from: RelativePath,
        to: RelativePath,
    },
    CreateEventChannel {
        channel: Channel,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatherArgs {
    container_id: String,
    event_channel_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadArgs {
    container_id: String,
    local_file_path: String,
    cloud_file_name: String,
    event_channel_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadArgs {
    container_id: String,
    cloud_file_name: String,
    local_file_path: String,
    event_channel_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteArgs {
    container_id: String,
    cloud_file_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveArgs {
    container_id: String,
    at_relative_path: String,
    to_relative_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventChannelArgs {
    event_channel_name: String,
}

fn arguments<T: DeserializeOwned>(call: &MethodCall) -> Result<T, StorageError> {
    T::deserialize(&call.arguments)
        .map_err(|e| StorageError::Argument(format!("{}: {e}", call.method)))
}

fn local_path(path: String) -> Result<PathBuf, StorageError> {
    if path.is_empty() {
        return Err(StorageError::Argument(
            "localFilePath must not be empty".to_string(),
        ));
    }
    Ok(PathBuf::from(path))
}

impl Request {
    /// Decodes and validates a call
    ///
    /// # Errors
    /// - `StorageError::NotImplemented` for an unknown method
    /// - `StorageError::Argument` for missing, mistyped or invalid arguments
    pub fn decode(call: &MethodCall) -> Result<Self, StorageError> {
        let request = match call.method.as_str() {
            "gather" => {
                let args: GatherArgs = arguments(call)?;
                Request::Gather {
                    container_id: ContainerId::new(args.container_id)?,
                    channel: Channel::optional(&args.event_channel_name),
                }
            }
            "upload" => {
                let args: UploadArgs = arguments(call)?;
                Request::Upload {
                    container_id: ContainerId::new(args.container_id)?,
                    local_path: local_path(args.local_file_path)?,
                    cloud_path: RelativePath::new(args.cloud_file_name)?,
                    channel: Channel::optional(&args.event_channel_name),
                }
            }
            "download" => {
                let args: DownloadArgs = arguments(call)?;
                Request::Download {
                    container_id: ContainerId::new(args.container_id)?,
                    cloud_path: RelativePath::new(args.cloud_file_name)?,
                    local_path: local_path(args.local_file_path)?,
                    channel: Channel::new(args.event_channel_name)?,
                }
            }
            "delete" => {
                let args: DeleteArgs = arguments(call)?;
                Request::Delete {
                    container_id: ContainerId::new(args.container_id)?,
                    cloud_path: RelativePath::new(args.cloud_file_name)?,
                }
            }
            "move" => {
                let args: MoveArgs = arguments(call)?;
                Request::Move {
                    container_id: ContainerId::new(args.container_id)?,
                    from: RelativePath::new(args.at_relative_path)?,
                    to: RelativePath::new(args.to_relative_path)?,
                }
            }
            "createEventChannel" => {
                let args: CreateEventChannelArgs = arguments(call)?;
                Request::CreateEventChannel {
                    channel: Channel::new(args.event_channel_name)?,
                }
            }
            other => return Err(StorageError::NotImplemented(other.to_string())),
        };
        Ok(request)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// Successful result of a call
#[derive(Debug)]
pub enum Reply {
    Unit,
    Listing(Vec<FileEntry>),
    Channel(EventStream),
}

impl Reply {
    /// JSON result value; a channel reply renders as its name
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Reply::Unit => serde_json::Value::Null,
            Reply::Listing(files) => serde_json::json!(files),
            Reply::Channel(stream) => serde_json::json!(stream.channel().as_str()),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Runs method calls against a [`StorageService`]
#[derive(Debug, Clone)]
pub struct Dispatcher {
    service: Arc<StorageService>,
}

impl Dispatcher {
    pub fn new(service: Arc<StorageService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &StorageService {
        &self.service
    }

    /// Decodes and runs one call
    ///
    /// # Errors
    /// Returns the decoding error, or the error of the operation itself.
    pub async fn handle(&self, call: &MethodCall) -> Result<Reply, StorageError> {
        debug!(method = %call.method, "Dispatching method call");
        match Request::decode(call)? {
            Request::Gather {
                container_id,
                channel,
            } => self
                .service
                .gather(&container_id, channel.as_ref())
                .await
                .map(Reply::Listing),
            Request::Upload {
                container_id,
                local_path,
                cloud_path,
                channel,
            } => self
                .service
                .upload(&container_id, &local_path, &cloud_path, channel.as_ref())
                .await
                .map(|()| Reply::Unit),
            Request::Download {
                container_id,
                cloud_path,
                local_path,
                channel,
            } => self
                .service
                .download(&container_id, &cloud_path, &local_path, &channel)
                .await
                .map(|()| Reply::Unit),
            Request::Delete {
                container_id,
                cloud_path,
            } => self
                .service
                .delete(&container_id, &cloud_path)
                .await
                .map(|()| Reply::Unit),
            Request::Move {
                container_id,
                from,
                to,
            } => self
                .service
                .move_item(&container_id, &from, &to)
                .await
                .map(|()| Reply::Unit),
            Request::CreateEventChannel { channel } => {
                self.service.create_channel(&channel).map(Reply::Channel)
            }
        }
    }
}
