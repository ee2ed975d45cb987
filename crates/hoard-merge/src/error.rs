use hoard_archive::ArchiveError;
use hoard_store::StoreError;
use hoard_types::{AFile, DFile, Hour, MultiError};
use thiserror::Error;

/// Errors produced by the merge engine.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no archives found in hour {0}")]
    EmptyHour(Hour),

    /// Every source archive of the hour failed to load.
    #[error("none of the archives in hour {hour} could be read")]
    NoReadableSources {
        hour: Hour,
        #[source]
        source: MultiError<ArchiveError>,
    },

    /// A member of a readable source could not be copied into the merged
    /// archive. Nothing was stored.
    #[error("failed to copy {dfile} out of {afile}: {reason}")]
    CopyFailed {
        afile: AFile,
        dfile: DFile,
        reason: String,
    },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A merge job ended without reporting a result.
    #[error("{0} merge job(s) did not report a result")]
    Abandoned(usize),

    #[error(transparent)]
    Multiple(MultiError<MergeError>),
}

pub type MergeResult<T> = Result<T, MergeError>;
