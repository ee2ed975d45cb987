use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hoard_types::{AFile, Hour};

use crate::error::StoreResult;
use crate::memory::InMemoryStorage;
use crate::search::prefixes_for_range;
use crate::traits::{AStore, AStoreSearchResult, PersistedStorage};

/// An [`AStore`] laid out on a byte backend as `YYYY/MM/DD/HH/{afile}`.
#[derive(Clone)]
pub struct PersistedAStore {
    storage: Arc<dyn PersistedStorage>,
}

impl PersistedAStore {
    pub fn new(storage: Arc<dyn PersistedStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn PersistedStorage> {
        &self.storage
    }
}

impl AStore for PersistedAStore {
    fn store(&self, afile: &AFile, content: &[u8]) -> StoreResult<()> {
        self.storage.put(&afile.key(), content)
    }

    fn get(&self, afile: &AFile) -> StoreResult<Vec<u8>> {
        self.storage.get(&afile.key())
    }

    fn delete(&self, afile: &AFile) -> StoreResult<()> {
        self.storage.delete(&afile.key())
    }

    fn search(&self, start: Option<Hour>, end: Hour) -> StoreResult<Vec<AStoreSearchResult>> {
        let mut by_hour: BTreeMap<Hour, AStoreSearchResult> = BTreeMap::new();
        for prefix in prefixes_for_range(start, end) {
            for result in self.storage.search(&prefix)? {
                let Some(hour) = Hour::from_prefix(&result.prefix) else {
                    tracing::warn!(storage = %self.storage, prefix = %result.prefix, "unrecognized directory in storage");
                    continue;
                };
                if !hour.is_between(start, end) {
                    continue;
                }
                for name in result.names {
                    match name.parse::<AFile>() {
                        Ok(afile) if afile.hour == hour => {
                            by_hour
                                .entry(hour)
                                .or_insert_with(|| AStoreSearchResult::new(hour))
                                .afiles
                                .insert(afile);
                        }
                        _ => {
                            tracing::warn!(storage = %self.storage, prefix = %result.prefix, name = %name, "unrecognized file in storage");
                        }
                    }
                }
            }
        }
        Ok(by_hour.into_values().collect())
    }
}

impl fmt::Display for PersistedAStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.storage, f)
    }
}
