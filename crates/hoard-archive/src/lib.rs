//! Hourly archive container for Hoard.
//!
//! An archive bundles every DFile captured for one feed in one hour. It is a
//! tar stream, compressed with gzip, xz or zstd, holding one entry per distinct
//! payload followed by a JSON [`Manifest`] describing how the archive was
//! assembled.
//!
//! # Lifecycle
//!
//! ```text
//! Archive::new(hour) -> store(..)* -> lock() -> LockedArchive
//!                                               |- serialize(spec) -> bytes
//!                      LockedArchive::deserialize(bytes, format) <-|
//! ```
//!
//! # Design Rules
//!
//! 1. The archive hash is a function of the DFile set only; insertion order
//!    and compression never change it.
//! 2. Identical payloads are stored once; every DFile identity is kept.
//! 3. Serialization is deterministic for a given locked archive.
//! 4. An entry that is not a DFile, or whose bytes do not match its name,
//!    makes the whole archive unreadable.

pub mod archive;
pub mod codec;
pub mod error;
pub mod manifest;
pub mod ops;

pub use archive::{Archive, LockedArchive, MANIFEST_NAME, UNKNOWN_ASSEMBLER};
pub use error::{ArchiveError, ArchiveResult};
pub use manifest::{Manifest, MAX_MANIFEST_DEPTH};
pub use ops::{create_from_dfiles, read, recompress, unpack, write, ArchiveContext};
