//! Replica audit for Hoard.
//!
//! Writes to a [`hoard_store::ReplicatedAStore`] fan out without rollback,
//! so replicas drift: an upload may reach one bucket and not another, or two
//! collectors may each upload an archive for the same hour. The audit
//! compares every replica against the union of all of them and repairs what
//! differs.
//!
//! # Problems
//!
//! - [`Problem::UnmergedHour`] -- more than one AFile for an hour
//! - [`Problem::NonReplicatedData`] -- an hour missing from one replica
//! - [`Problem::IncorrectCompression`] -- an AFile in the wrong format
//!
//! # Design Rules
//!
//! 1. A dry run never mutates a store.
//! 2. Each problem is fixed independently; one failure does not stop the rest.
//! 3. Running the audit again over a fixed range finds nothing.

pub mod auditor;
pub mod error;
pub mod problem;

pub use auditor::{AuditPolicy, Auditor};
pub use error::{AuditError, AuditResult};
pub use problem::Problem;
