// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The workitem payload is not a valid JSON object.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// An inbound file could not be placed in the working directory.
    #[error("File staging error: {0}")]
    FileStaging(String),

    /// The external task could not be run or signalled failure.
    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    /// The queue service rejected or failed a call (pop, update, download, ...).
    #[error("Queue transport error: {0}")]
    Transport(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkerError>;
