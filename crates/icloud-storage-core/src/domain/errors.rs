//! Storage error taxonomy
//!
//! Every error that leaves the engine, either as the result of an operation
//! or as the terminal event of a channel, is a [`StorageError`]. Each variant
//! carries a stable code and a human-readable message so that front ends can
//! surface them without knowing the variant layout.

use thiserror::Error;

/// Errors returned by storage operations and delivered on event channels
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The request was malformed (missing or mistyped field)
    #[error("Invalid Arguments: {0}")]
    Argument(String),

    /// The container identifier could not be resolved to a root
    #[error(
        "Invalid containerId, or user is not signed in, or user disabled iCloud permission: {0}"
    )]
    Container(String),

    /// The target of a delete does not exist
    #[error("The file does not exist: {0}")]
    FileNotFound(String),

    /// An underlying filesystem or sync-provider failure
    #[error("Native Code Error: {0}")]
    Native(String),

    /// A channel with the same name is already registered or in use
    #[error("Channel already registered: {0}")]
    DuplicateChannel(String),

    /// The channel was referenced before being created, or after teardown
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// The subscriber cancelled before the operation produced a result
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The dispatcher does not know the requested method
    #[error("Method not implemented: {0}")]
    NotImplemented(String),
}

impl StorageError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Argument(_) => "E_ARG",
            StorageError::Container(_) => "E_CTR",
            StorageError::FileNotFound(_) => "E_FNF",
            StorageError::Native(_) => "E_NAT",
            StorageError::DuplicateChannel(_) => "E_DUP",
            StorageError::ChannelNotFound(_) => "E_CHN",
            StorageError::Cancelled(_) => "E_CANCEL",
            StorageError::NotImplemented(_) => "E_IMPL",
        }
    }

    /// Short message without the per-occurrence details
    pub fn message(&self) -> &'static str {
        match self {
            StorageError::Argument(_) => "Invalid Arguments",
            StorageError::Container(_) => {
                "Invalid containerId, or user is not signed in, or user disabled iCloud permission"
            }
            StorageError::FileNotFound(_) => "The file does not exist",
            StorageError::Native(_) => "Native Code Error",
            StorageError::DuplicateChannel(_) => "Channel already registered",
            StorageError::ChannelNotFound(_) => "Channel not found",
            StorageError::Cancelled(_) => "Operation cancelled",
            StorageError::NotImplemented(_) => "Method not implemented",
        }
    }

    /// Per-occurrence details (path, channel name, underlying error text)
    pub fn details(&self) -> &str {
        match self {
            StorageError::Argument(d)
            | StorageError::Container(d)
            | StorageError::FileNotFound(d)
            | StorageError::Native(d)
            | StorageError::DuplicateChannel(d)
            | StorageError::ChannelNotFound(d)
            | StorageError::Cancelled(d)
            | StorageError::NotImplemented(d) => d,
        }
    }

    /// JSON representation used by the dispatcher and the CLI
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.message(),
            "details": self.details(),
        })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Native(err.to_string())
    }
}

impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        StorageError::Native(format!("{err:#}"))
    }
}
