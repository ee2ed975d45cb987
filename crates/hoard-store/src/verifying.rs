use std::fmt;

use hoard_types::{Key, Prefix};

use crate::error::{StoreError, StoreResult};
use crate::traits::{PersistedStorage, SearchResult};

/// Wraps a backend and re-reads every value after `put`, failing the write
/// if the BLAKE3 digest of the stored bytes differs from what was written.
///
/// Other operations pass straight through.
pub struct VerifyingStorage<S> {
    inner: S,
}

impl<S: PersistedStorage> VerifyingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: PersistedStorage> PersistedStorage for VerifyingStorage<S> {
    fn put(&self, key: &Key, content: &[u8]) -> StoreResult<()> {
        let written = blake3::hash(content);
        self.inner.put(key, content)?;
        let read = blake3::hash(&self.inner.get(key)?);
        if written != read {
            return Err(StoreError::VerificationFailed {
                key: key.id(),
                written: hex::encode(written.as_bytes()),
                read: hex::encode(read.as_bytes()),
            });
        }
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        self.inner.get(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn search(&self, prefix: &Prefix) -> StoreResult<Vec<SearchResult>> {
        self.inner.search(prefix)
    }
}

impl<S: PersistedStorage> fmt::Display for VerifyingStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (verified)", self.inner)
    }
}
