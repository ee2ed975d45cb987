//! S3-compatible remote byte storage.
//!
//! The store is driven through the `object_store` crate on a private
//! single-threaded tokio runtime, so callers stay synchronous. Every remote
//! call carries its own deadline; a timeout surfaces as
//! [`StoreError::Timeout`] and is retried by the next periodic run rather
//! than in-line.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::TryStreamExt;
use hoard_types::{Key, Prefix};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::error::{StoreError, StoreResult};
use crate::traits::{PersistedStorage, SearchResult};

/// Connection settings for one S3-compatible bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    /// Key prefix inside the bucket; feed data lives under `{prefix}/{feed}`.
    #[serde(default)]
    pub prefix: String,
    /// Connect over plain HTTP instead of TLS.
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl ObjectStorageConfig {
    fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.insecure {
            format!("http://{}", self.endpoint)
        } else {
            format!("https://{}", self.endpoint)
        }
    }
}

/// Per-operation deadlines for remote calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectStorageTimeouts {
    pub put: Duration,
    pub get: Duration,
    pub delete: Duration,
    pub list: Duration,
}

impl Default for ObjectStorageTimeouts {
    fn default() -> Self {
        Self {
            put: Duration::from_secs(30),
            get: Duration::from_secs(100),
            delete: Duration::from_secs(10),
            list: Duration::from_secs(10),
        }
    }
}

/// Byte storage backed by a remote object store.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    root: String,
    description: String,
    timeouts: ObjectStorageTimeouts,
    runtime: Runtime,
    lock: Mutex<()>,
}

impl ObjectStorage {
    /// Connect to the bucket described by `config`, scoped to `feed_id`.
    pub fn connect(config: &ObjectStorageConfig, feed_id: &str) -> StoreResult<Self> {
        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint_url())
            .with_allow_http(config.insecure)
            .with_bucket_name(&config.bucket_name)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to create S3 client: {e}")))?;
        let root = [config.prefix.trim_matches('/'), feed_id]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let description = format!("{}/{}/{}", config.endpoint, config.bucket_name, root);
        Self::with_store(Arc::new(store), root, description)
    }

    /// Wrap an existing object store; keys are placed under `root`.
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        root: impl Into<String>,
        description: impl Into<String>,
    ) -> StoreResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            store,
            root: root.into(),
            description: description.into(),
            timeouts: ObjectStorageTimeouts::default(),
            runtime,
            lock: Mutex::new(()),
        })
    }

    pub fn with_timeouts(mut self, timeouts: ObjectStorageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn object_path(&self, parts: impl Iterator<Item = String>) -> ObjectPath {
        let mut joined: Vec<String> = Vec::new();
        if !self.root.is_empty() {
            joined.push(self.root.clone());
        }
        joined.extend(parts);
        ObjectPath::from(joined.join("/"))
    }

    fn key_path(&self, key: &Key) -> ObjectPath {
        self.object_path(
            key.prefix
                .parts()
                .iter()
                .cloned()
                .chain(std::iter::once(key.name.clone())),
        )
    }

    /// Split a listed location into its prefix below `root` and its name.
    fn split_location(&self, location: &ObjectPath) -> Option<(Prefix, String)> {
        let location = location.to_string();
        let relative = if self.root.is_empty() {
            location.as_str()
        } else {
            location.strip_prefix(&self.root)?.strip_prefix('/')?
        };
        let mut parts: Vec<&str> = relative.split('/').collect();
        let name = parts.pop()?.to_string();
        Some((Prefix::new(parts), name))
    }

    fn run<T, F>(&self, operation: &'static str, key: String, deadline: Duration, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, object_store::Error>>,
    {
        let _guard = self.lock.lock().expect("lock poisoned");
        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(deadline, fut).await });
        match result {
            Err(_) => Err(StoreError::Timeout {
                operation,
                key,
                seconds: deadline.as_secs(),
            }),
            Ok(Err(object_store::Error::NotFound { .. })) => Err(StoreError::NotFound(key)),
            Ok(Err(e)) => Err(StoreError::Backend {
                backend: self.description.clone(),
                reason: e.to_string(),
            }),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

impl PersistedStorage for ObjectStorage {
    fn put(&self, key: &Key, content: &[u8]) -> StoreResult<()> {
        let path = self.key_path(key);
        let payload = bytes::Bytes::copy_from_slice(content);
        self.run("put", key.id(), self.timeouts.put, async {
            self.store.put(&path, payload.into()).await.map(|_| ())
        })
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let path = self.key_path(key);
        self.run("get", key.id(), self.timeouts.get, async {
            let result = self.store.get(&path).await?;
            Ok::<_, object_store::Error>(result.bytes().await?.to_vec())
        })
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let path = self.key_path(key);
        match self.run("delete", key.id(), self.timeouts.delete, async {
            self.store.delete(&path).await
        }) {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    fn search(&self, prefix: &Prefix) -> StoreResult<Vec<SearchResult>> {
        let path = self.object_path(prefix.parts().iter().cloned());
        let listed = self.run("list", prefix.id(), self.timeouts.list, async {
            self.store.list(Some(&path)).try_collect::<Vec<_>>().await
        })?;
        let mut grouped: BTreeMap<Prefix, Vec<String>> = BTreeMap::new();
        for meta in listed {
            match self.split_location(&meta.location) {
                Some((found, name)) if prefix.is_parent_of(&found) => {
                    grouped.entry(found).or_default().push(name);
                }
                _ => tracing::debug!(location = %meta.location, "skipping object outside prefix"),
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(prefix, mut names)| {
                names.sort();
                SearchResult { prefix, names }
            })
            .collect())
    }
}

impl fmt::Display for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object storage at {}", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn storage(root: &str) -> ObjectStorage {
        ObjectStorage::with_store(Arc::new(InMemory::new()), root, "memory").unwrap()
    }

    fn key(parts: &[&str], name: &str) -> Key {
        Key::new(Prefix::new(parts.iter().copied()), name)
    }

    #[test]
    fn put_get_delete() {
        let storage = storage("prod/feed");
        let k = key(&["2020", "01", "02", "03"], "a.tar.gz");
        storage.put(&k, b"bytes").unwrap();
        assert_eq!(storage.get(&k).unwrap(), b"bytes");
        storage.delete(&k).unwrap();
        assert!(storage.get(&k).unwrap_err().is_not_found());
        storage.delete(&k).unwrap();
    }

    #[test]
    fn search_groups_under_root() {
        let storage = storage("prod/feed");
        storage.put(&key(&["2020", "01", "02", "03"], "a"), b"").unwrap();
        storage.put(&key(&["2020", "01", "02", "03"], "b"), b"").unwrap();
        storage.put(&key(&["2020", "01", "02", "04"], "c"), b"").unwrap();
        storage.put(&key(&["2021", "01", "01", "00"], "d"), b"").unwrap();

        let results = storage.search(&Prefix::new(["2020"])).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].prefix, Prefix::new(["2020", "01", "02", "03"]));
        assert_eq!(results[0].names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.search(&Prefix::empty()).unwrap().len(), 3);
    }

    #[test]
    fn feeds_sharing_a_bucket_are_isolated() {
        let shared: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let a = ObjectStorage::with_store(shared.clone(), "prod/a", "memory").unwrap();
        let b = ObjectStorage::with_store(shared, "prod/b", "memory").unwrap();
        a.put(&key(&["2020"], "x"), b"").unwrap();
        assert!(b.search(&Prefix::empty()).unwrap().is_empty());
        assert_eq!(a.search(&Prefix::empty()).unwrap().len(), 1);
    }

    #[test]
    fn config_endpoint_scheme() {
        let mut config: ObjectStorageConfig = toml::from_str(
            r#"
            endpoint = "nyc3.example.com"
            access_key = "a"
            secret_key = "s"
            bucket_name = "hoard"
            "#,
        )
        .unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.endpoint_url(), "https://nyc3.example.com");
        config.insecure = true;
        assert_eq!(config.endpoint_url(), "http://nyc3.example.com");
    }
}
