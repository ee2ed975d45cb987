use std::collections::BTreeSet;
use std::fmt;

use hoard_types::{AFile, DFile, Hour, Key, Prefix};

use crate::error::StoreResult;

/// A non-empty leaf prefix and the names stored directly beneath it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub prefix: Prefix,
    pub names: Vec<String>,
}

/// Byte-level key/value backend.
///
/// All implementations must satisfy these invariants:
/// - `put` overwrites any existing value under the key.
/// - `delete` of a missing key succeeds.
/// - `search(p)` returns one entry for every prefix `q` with `p` as a parent
///   such that at least one key is stored directly under `q`.
/// - Operations on one instance are safe to call from multiple threads.
pub trait PersistedStorage: Send + Sync + fmt::Display {
    fn put(&self, key: &Key, content: &[u8]) -> StoreResult<()>;

    /// Returns `StoreError::NotFound` if nothing is stored under the key.
    fn get(&self, key: &Key) -> StoreResult<Vec<u8>>;

    fn delete(&self, key: &Key) -> StoreResult<()>;

    fn search(&self, prefix: &Prefix) -> StoreResult<Vec<SearchResult>>;

    /// Every key beneath `prefix`.
    fn list(&self, prefix: &Prefix) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        for result in self.search(prefix)? {
            for name in result.names {
                keys.push(Key::new(result.prefix.clone(), name));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// The archive files stored for one hour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AStoreSearchResult {
    pub hour: Hour,
    pub afiles: BTreeSet<AFile>,
}

impl AStoreSearchResult {
    pub fn new(hour: Hour) -> Self {
        Self {
            hour,
            afiles: BTreeSet::new(),
        }
    }
}

/// Hour-partitioned store of archive files.
pub trait AStore: Send + Sync + fmt::Display {
    fn store(&self, afile: &AFile, content: &[u8]) -> StoreResult<()>;

    fn get(&self, afile: &AFile) -> StoreResult<Vec<u8>>;

    /// Deleting a missing AFile succeeds.
    fn delete(&self, afile: &AFile) -> StoreResult<()>;

    /// Every hour in `[start, end]` holding at least one AFile, with its
    /// AFiles, in ascending hour order. `start = None` is unbounded.
    fn search(&self, start: Option<Hour>, end: Hour) -> StoreResult<Vec<AStoreSearchResult>>;

    fn list_in_hour(&self, hour: Hour) -> StoreResult<Vec<AFile>> {
        Ok(self
            .search(Some(hour), hour)?
            .into_iter()
            .flat_map(|result| result.afiles)
            .collect())
    }

    fn list_non_empty_hours(&self) -> StoreResult<Vec<Hour>> {
        Ok(self
            .search(None, Hour::max())?
            .into_iter()
            .map(|result| result.hour)
            .collect())
    }

    /// Every stored AFile, in hour order.
    fn list_all(&self) -> StoreResult<Vec<AFile>> {
        Ok(self
            .search(None, Hour::max())?
            .into_iter()
            .flat_map(|result| result.afiles)
            .collect())
    }
}

/// Read access to hour-partitioned download files.
///
/// Implemented by download stores and by locked archives.
pub trait ReadableDStore {
    fn get(&self, dfile: &DFile) -> StoreResult<Vec<u8>>;

    /// DFiles captured in `hour`, sorted.
    fn list_in_hour(&self, hour: Hour) -> StoreResult<Vec<DFile>>;

    /// Hours holding at least one DFile, ascending.
    fn list_non_empty_hours(&self) -> StoreResult<Vec<Hour>>;
}

/// Hour-partitioned store of download files.
pub trait DStore: ReadableDStore + Send + Sync + fmt::Display {
    fn store(&self, dfile: &DFile, content: &[u8]) -> StoreResult<()>;

    /// Deleting a missing DFile succeeds.
    fn delete(&self, dfile: &DFile) -> StoreResult<()>;
}

/// Copy one AFile between stores.
pub fn copy_afile(afile: &AFile, source: &dyn AStore, target: &dyn AStore) -> StoreResult<()> {
    let content = source.get(afile)?;
    target.store(afile, &content)
}
