use hoard_store::StoreError;
use hoard_types::{DFile, Hash, Hour};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("manifest serialization error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("unrecognized archive entry: {0}")]
    UnrecognizedEntry(String),

    #[error("content of {dfile} hashes to {actual}")]
    ContentMismatch { dfile: DFile, actual: Hash },

    #[error("{dfile} does not belong to hour {hour}")]
    WrongHour { dfile: DFile, hour: Hour },

    #[error("archive has no downloads")]
    Empty,
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
