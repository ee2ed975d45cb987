use std::path::PathBuf;

use hoard_archive::ArchiveError;
use hoard_audit::AuditError;
use hoard_merge::MergeError;
use hoard_store::StoreError;
use hoard_types::MultiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown feed: {0}")]
    UnknownFeed(String),

    #[error("no remote object storage is configured")]
    NoRemoteStorage,

    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Multiple(MultiError<TaskError>),
}

pub type TaskResult<T> = Result<T, TaskError>;

/// `Ok(())` if `errors` is empty, otherwise every error combined.
pub(crate) fn check(errors: Vec<TaskError>) -> TaskResult<()> {
    MultiError::check(errors).map_err(TaskError::Multiple)
}
