use crate::config::ConfigError;
use crate::jobs::error::JobError;
use crate::sink::error::StoreError;
use crate::source::error::FetchError;
use crate::stations::error::DirectoryError;
use crate::types::error::SelectorError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    InvalidSelector(#[from] SelectorError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("No downloadable result named '{0}'")]
    ResultNotFound(String),

    #[error("Link for '{0}' is invalid or has expired")]
    LinkRejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] FetchError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create storage directory '{0}'")]
    StorageDirCreation(PathBuf, #[source] std::io::Error),
}
