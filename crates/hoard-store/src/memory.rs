use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use hoard_types::{Key, Prefix};

use crate::error::{StoreError, StoreResult};
use crate::traits::{PersistedStorage, SearchResult};

/// In-memory, `BTreeMap`-based byte storage.
///
/// Intended for tests and for short-lived scratch stores. Values are held
/// behind a `RwLock` and cloned on read and write.
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> usize {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistedStorage for InMemoryStorage {
    fn put(&self, key: &Key, content: &[u8]) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.clone(), content.to_vec());
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let map = self.entries.read().expect("lock poisoned");
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.id()))
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.remove(key);
        Ok(())
    }

    fn search(&self, prefix: &Prefix) -> StoreResult<Vec<SearchResult>> {
        let map = self.entries.read().expect("lock poisoned");
        let mut grouped: BTreeMap<&Prefix, Vec<String>> = BTreeMap::new();
        for key in map.keys() {
            if prefix.is_parent_of(&key.prefix) {
                grouped.entry(&key.prefix).or_default().push(key.name.clone());
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(prefix, names)| SearchResult {
                prefix: prefix.clone(),
                names,
            })
            .collect())
    }
}

impl fmt::Display for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("in memory")
    }
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str], name: &str) -> Key {
        Key::new(Prefix::new(parts.iter().copied()), name)
    }

    // ---------------------------------------------------------------
    // Basic operations
    // ---------------------------------------------------------------

    #[test]
    fn put_get_roundtrip() {
        let store = InMemoryStorage::new();
        let k = key(&["a", "b"], "c");
        store.put(&k, b"hello").unwrap();
        assert_eq!(store.get(&k).unwrap(), b"hello");
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 5);
    }

    #[test]
    fn put_overwrites() {
        let store = InMemoryStorage::new();
        let k = key(&["a"], "c");
        store.put(&k, b"one").unwrap();
        store.put(&k, b"two").unwrap();
        assert_eq!(store.get(&k).unwrap(), b"two");
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryStorage::new();
        let err = store.get(&key(&["a"], "missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_missing_is_ok() {
        let store = InMemoryStorage::new();
        store.delete(&key(&["a"], "missing")).unwrap();
        assert!(store.is_empty());
    }

    // ---------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------

    #[test]
    fn search_groups_names_by_leaf_prefix() {
        let store = InMemoryStorage::new();
        store.put(&key(&["2020", "01"], "x"), b"").unwrap();
        store.put(&key(&["2020", "01"], "y"), b"").unwrap();
        store.put(&key(&["2020", "02"], "z"), b"").unwrap();
        store.put(&key(&["2021", "01"], "w"), b"").unwrap();

        let results = store.search(&Prefix::new(["2020"])).unwrap();
        assert_eq!(
            results,
            vec![
                SearchResult {
                    prefix: Prefix::new(["2020", "01"]),
                    names: vec!["x".into(), "y".into()],
                },
                SearchResult {
                    prefix: Prefix::new(["2020", "02"]),
                    names: vec!["z".into()],
                },
            ]
        );
        assert_eq!(store.search(&Prefix::empty()).unwrap().len(), 3);
        assert!(store.search(&Prefix::new(["2019"])).unwrap().is_empty());
    }

    #[test]
    fn list_flattens_search() {
        let store = InMemoryStorage::new();
        store.put(&key(&["b"], "2"), b"").unwrap();
        store.put(&key(&["a"], "1"), b"").unwrap();
        let keys = store.list(&Prefix::empty()).unwrap();
        assert_eq!(keys, vec![key(&["a"], "1"), key(&["b"], "2")]);
    }
}
