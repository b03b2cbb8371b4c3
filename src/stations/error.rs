use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read station table '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse station table row")]
    Parse(#[from] csv::Error),

    #[error("Station table contains no stations")]
    Empty,

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
