//! Shared error types for the stack launcher

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },

    #[error("Invalid log level: {level}")]
    InvalidLogLevel { level: String },

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type SharedResult<T> = Result<T, SharedError>;
