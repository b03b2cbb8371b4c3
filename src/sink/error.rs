use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("No stored object for key '{0}'")]
    NotFound(String),

    #[error("Failed to create storage directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write object file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to read object file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode dataset as CSV")]
    Encode(#[source] PolarsError),

    #[error("Failed to sign link for '{key}': {reason}")]
    Signing { key: String, reason: String },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
