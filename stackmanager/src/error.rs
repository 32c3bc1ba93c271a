//! Launcher error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Network unavailable while fetching {url}: {message}")]
    NetworkUnavailable { url: String, message: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to write {path}: {source}")]
    DownloadWriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Coordinator unreachable: {message}")]
    CoordinatorUnreachable { message: String },

    #[error("Coordinator returned a missing or malformed identifier: {body:?}")]
    MissingIdentity { body: String },

    #[error("Release manifest could not be parsed: {message}")]
    ManifestParse { message: String },

    #[error("Failed to spawn {name}: {source}")]
    ProcessSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to signal {name}: {message}")]
    ProcessSignal { name: String, message: String },

    #[error("Not a content set URL: {url}")]
    InvalidContentSet { url: String },

    #[error("Archive extraction failed for {path}: {message}")]
    ArchiveExtraction { path: String, message: String },

    #[error("Stack cannot start, still waiting on: {pending}")]
    RequirementsNotReady { pending: String },

    #[error("Configuration error: {field}")]
    Configuration { field: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl StackError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::Configuration { field: field.into() }
    }

    pub fn network(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::NetworkUnavailable {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn unreachable(message: impl std::fmt::Display) -> Self {
        Self::CoordinatorUnreachable {
            message: message.to_string(),
        }
    }

    /// Whether the failure came from the transport rather than the payload
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}

pub type StackResult<T> = Result<T, StackError>;
