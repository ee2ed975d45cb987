use hoard_archive::ArchiveError;
use hoard_merge::MergeError;
use hoard_store::StoreError;
use hoard_types::MultiError;
use thiserror::Error;

use crate::problem::Problem;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("no replica at index {0}")]
    UnknownReplica(usize),

    /// Returned by a dry run that found problems.
    #[error("found {} problem(s)", problems.len())]
    ProblemsFound { problems: Vec<Problem> },

    #[error("failed to fix {problem}: {source}")]
    FixFailed {
        problem: Problem,
        #[source]
        source: Box<AuditError>,
    },

    #[error(transparent)]
    Multiple(MultiError<AuditError>),
}

pub type AuditResult<T> = Result<T, AuditError>;
