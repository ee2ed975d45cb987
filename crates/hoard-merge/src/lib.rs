//! Merge engine for Hoard.
//!
//! Uploads, retries and concurrent collectors can leave several AFiles for
//! the same feed hour. Merging reads them all, deduplicates their DFiles
//! through a fresh [`hoard_archive::Archive`], and replaces them with one
//! canonical AFile whose manifest records each source as a child.
//!
//! # Design Rules
//!
//! 1. Merging is idempotent: an hour already represented by one AFile is
//!    left untouched.
//! 2. Unreadable sources are skipped and never deleted.
//! 3. Sources are deleted only after the merged AFile has been stored.
//! 4. Merges are CPU bound; [`merge_all`] bounds them with a [`WorkerPool`].

pub mod engine;
pub mod error;
pub mod pool;

pub use engine::{merge_all, merge_hour, MergeReport};
pub use error::{MergeError, MergeResult};
pub use pool::{Completion, ErrorGroup, GroupOutcome, WorkerPool};
