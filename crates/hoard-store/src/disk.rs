use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hoard_types::{Key, Prefix};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::{PersistedStorage, SearchResult};

/// Temporary files created during writes start with this and are never
/// reported by `search`.
const TEMP_PREFIX: &str = ".tmp";

/// Byte storage rooted at a local directory.
///
/// Each prefix component becomes a directory. Writes go to a temporary file
/// in the target directory and are renamed into place, so readers never see
/// partial values. Deleting the last key in a directory removes the
/// directory and any newly-empty parents up to the root.
pub struct DiskStorage {
    root: PathBuf,
    lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, prefix: &Prefix) -> PathBuf {
        let mut path = self.root.clone();
        for part in prefix.parts() {
            path.push(part);
        }
        path
    }

    fn path(&self, key: &Key) -> PathBuf {
        self.dir(&key.prefix).join(&key.name)
    }

    fn prune_empty_dirs(&self, start: &Path) {
        let mut dir = start.to_path_buf();
        while dir != self.root && dir.starts_with(&self.root) {
            // Fails (and stops) once the directory is non-empty.
            if fs::remove_dir(&dir).is_err() {
                break;
            }
            if !dir.pop() {
                break;
            }
        }
    }
}

impl PersistedStorage for DiskStorage {
    fn put(&self, key: &Key, content: &[u8]) -> StoreResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let dir = self.dir(&key.prefix);
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(&dir)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        match fs::read(self.path(key)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.id())),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        match fs::remove_file(self.path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.prune_empty_dirs(&self.dir(&key.prefix));
        Ok(())
    }

    fn search(&self, prefix: &Prefix) -> StoreResult<Vec<SearchResult>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let base = self.dir(prefix);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut grouped: BTreeMap<Prefix, Vec<String>> = BTreeMap::new();
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| ErrorKind::Other.into()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            let Some(parent) = entry.path().parent() else {
                continue;
            };
            let Ok(relative) = parent.strip_prefix(&self.root) else {
                continue;
            };
            let parts = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned());
            grouped.entry(Prefix::new(parts)).or_default().push(name);
        }
        Ok(grouped
            .into_iter()
            .map(|(prefix, names)| SearchResult { prefix, names })
            .collect())
    }
}

impl fmt::Display for DiskStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disk at {}", self.root.display())
    }
}
