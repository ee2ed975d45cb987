//! Hour-partitioned storage for Hoard.
//!
//! Downloaded payloads (DFiles) and hourly archives (AFiles) are stored under
//! a four-level `YYYY/MM/DD/HH` key hierarchy on top of a byte-level
//! backend.
//!
//! # Byte Backends
//!
//! All backends implement the [`PersistedStorage`] trait:
//!
//! - [`InMemoryStorage`] -- `BTreeMap`-based store for tests and scratch work
//! - [`DiskStorage`] -- directory tree on the local filesystem
//! - [`ObjectStorage`] -- S3-compatible bucket via `object_store`
//! - [`VerifyingStorage`] -- wrapper that re-reads and checks every write
//!
//! # Hour Stores
//!
//! - [`PersistedAStore`] / [`PersistedDStore`] -- archive and download stores
//!   over any backend
//! - [`ReplicatedAStore`] -- fan-out over N archive stores
//!
//! # Design Rules
//!
//! 1. Range searches issue as few backend listings as possible (see [`search`]).
//! 2. Unrecognized directories and file names are logged and skipped.
//! 3. Deleting a missing key succeeds.
//! 4. Each backend instance serializes its own operations; there is no
//!    cross-process locking.

pub mod astore;
pub mod disk;
pub mod dstore;
pub mod error;
pub mod memory;
pub mod object;
pub mod replicated;
pub mod search;
pub mod traits;
pub mod verifying;

pub use astore::PersistedAStore;
pub use disk::DiskStorage;
pub use dstore::PersistedDStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStorage;
pub use object::{ObjectStorage, ObjectStorageConfig, ObjectStorageTimeouts};
pub use replicated::ReplicatedAStore;
pub use traits::{
    copy_afile, AStore, AStoreSearchResult, DStore, PersistedStorage, ReadableDStore, SearchResult,
};
pub use verifying::VerifyingStorage;
