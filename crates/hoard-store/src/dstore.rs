use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use hoard_types::{DFile, Hour, Key, Prefix};

use crate::error::StoreResult;
use crate::memory::InMemoryStorage;
use crate::traits::{DStore, PersistedStorage, ReadableDStore};

/// A [`DStore`] laid out on a byte backend as `YYYY/MM/DD/HH/{dfile}`.
#[derive(Clone)]
pub struct PersistedDStore {
    storage: Arc<dyn PersistedStorage>,
}

impl PersistedDStore {
    pub fn new(storage: Arc<dyn PersistedStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()))
    }

    fn key(dfile: &DFile) -> Key {
        Key::new(dfile.hour().persistence_prefix(), dfile.name())
    }
}

impl ReadableDStore for PersistedDStore {
    fn get(&self, dfile: &DFile) -> StoreResult<Vec<u8>> {
        self.storage.get(&Self::key(dfile))
    }

    fn list_in_hour(&self, hour: Hour) -> StoreResult<Vec<DFile>> {
        let mut dfiles = BTreeSet::new();
        for result in self.storage.search(&hour.persistence_prefix())? {
            if result.prefix != hour.persistence_prefix() {
                continue;
            }
            for name in result.names {
                match name.parse::<DFile>() {
                    Ok(dfile) if dfile.hour() == hour => {
                        dfiles.insert(dfile);
                    }
                    _ => tracing::warn!(storage = %self.storage, name = %name, "unrecognized file in storage"),
                }
            }
        }
        Ok(dfiles.into_iter().collect())
    }

    fn list_non_empty_hours(&self) -> StoreResult<Vec<Hour>> {
        let mut hours = BTreeSet::new();
        for result in self.storage.search(&Prefix::empty())? {
            match Hour::from_prefix(&result.prefix) {
                Some(hour) => {
                    let holds_dfile = result
                        .names
                        .iter()
                        .any(|name| name.parse::<DFile>().is_ok_and(|dfile| dfile.hour() == hour));
                    if holds_dfile {
                        hours.insert(hour);
                    }
                }
                None => tracing::warn!(storage = %self.storage, prefix = %result.prefix, "unrecognized directory in storage"),
            }
        }
        Ok(hours.into_iter().collect())
    }
}

impl DStore for PersistedDStore {
    fn store(&self, dfile: &DFile, content: &[u8]) -> StoreResult<()> {
        self.storage.put(&Self::key(dfile), content)
    }

    fn delete(&self, dfile: &DFile) -> StoreResult<()> {
        self.storage.delete(&Self::key(dfile))
    }
}

impl fmt::Display for PersistedDStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.storage, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskStorage;
    use chrono::{TimeZone, Utc};
    use hoard_types::Hash;

    fn dfile(h: u32, minute: u32, content: &[u8]) -> DFile {
        let time = Utc.with_ymd_and_hms(2020, 5, 6, h, minute, 0).unwrap();
        DFile::new("feed_", ".json", time, Hash::of(content))
    }

    fn check_store(store: &dyn DStore) {
        let a = dfile(1, 0, b"a");
        let b = dfile(1, 30, b"b");
        let c = dfile(3, 15, b"c");
        store.store(&b, b"b").unwrap();
        store.store(&a, b"a").unwrap();
        store.store(&c, b"c").unwrap();

        assert_eq!(store.get(&a).unwrap(), b"a");
        assert_eq!(store.list_in_hour(a.hour()).unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(store.list_non_empty_hours().unwrap(), vec![a.hour(), c.hour()]);
        assert!(store.list_in_hour(Hour::new(2020, 5, 6, 2).unwrap()).unwrap().is_empty());

        store.delete(&a).unwrap();
        store.delete(&b).unwrap();
        assert_eq!(store.list_non_empty_hours().unwrap(), vec![c.hour()]);
        assert!(store.get(&a).unwrap_err().is_not_found());
    }

    #[test]
    fn in_memory_dstore() {
        check_store(&PersistedDStore::in_memory());
    }

    #[test]
    fn disk_dstore() {
        let dir = tempfile::TempDir::new().unwrap();
        check_store(&PersistedDStore::new(Arc::new(DiskStorage::new(dir.path()))));
    }

    #[test]
    fn unrecognized_names_are_skipped() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = PersistedDStore::new(storage.clone());
        let a = dfile(1, 0, b"a");
        store.store(&a, b"a").unwrap();
        storage.put(&Key::new(a.hour().persistence_prefix(), "README"), b"").unwrap();
        assert_eq!(store.list_in_hour(a.hour()).unwrap(), vec![a]);
    }

    #[test]
    fn hours_with_only_unrecognized_names_are_empty() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = PersistedDStore::new(storage.clone());
        let a = dfile(1, 0, b"a");
        store.store(&a, b"a").unwrap();
        let stray = Hour::new(2020, 5, 6, 4).unwrap();
        storage.put(&Key::new(stray.persistence_prefix(), "README"), b"").unwrap();
        let misplaced = dfile(1, 30, b"b");
        storage.put(&Key::new(Hour::new(2020, 5, 6, 5).unwrap().persistence_prefix(), misplaced.name()), b"b").unwrap();

        assert_eq!(store.list_non_empty_hours().unwrap(), vec![a.hour()]);
    }
}
