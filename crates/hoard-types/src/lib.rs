//! Identity types for Hoard.
//!
//! Every other Hoard crate depends on `hoard-types`. The types here define
//! how downloaded payloads and hourly archives are named, hashed and
//! partitioned in storage.
//!
//! # Key Types
//!
//! - [`Hash`] -- 12-character content identifier (truncated base32 SHA-256)
//! - [`Hour`] -- one-hour partition key
//! - [`DFile`] -- one downloaded payload
//! - [`AFile`] -- one hourly archive object
//! - [`CompressionSpec`] -- archive compression format and level
//! - [`Prefix`] / [`Key`] -- hierarchical storage addresses
//! - [`MultiError`] -- aggregated errors from independent sibling operations

pub mod afile;
pub mod compression;
pub mod dfile;
pub mod error;
pub mod hash;
pub mod hour;
pub mod key;

pub use afile::AFile;
pub use compression::{CompressionFormat, CompressionSpec};
pub use dfile::DFile;
pub use error::{MultiError, TypeError, TypeResult};
pub use hash::{Hash, HASH_LEN};
pub use hour::Hour;
pub use key::{Key, Prefix};
