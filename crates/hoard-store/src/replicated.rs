use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hoard_types::{AFile, Hour, MultiError};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AStore, AStoreSearchResult};

/// N independent [`AStore`] replicas presented as one store.
///
/// Writes and deletes fan out to every replica. A partial failure returns an
/// aggregated error without rolling back the replicas that succeeded;
/// divergence is detected and repaired later by the audit. Reads return the
/// union of all replicas, which the audit treats as ground truth.
#[derive(Clone)]
pub struct ReplicatedAStore {
    replicas: Vec<Arc<dyn AStore>>,
}

impl ReplicatedAStore {
    pub fn new(replicas: Vec<Arc<dyn AStore>>) -> Self {
        Self { replicas }
    }

    pub fn replicas(&self) -> &[Arc<dyn AStore>] {
        &self.replicas
    }

    fn fan_out<F>(&self, operation: &'static str, f: F) -> StoreResult<()>
    where
        F: Fn(&dyn AStore) -> StoreResult<()>,
    {
        let errors: Vec<StoreError> = self
            .replicas
            .iter()
            .filter_map(|replica| f(replica.as_ref()).err())
            .collect();
        let failed = errors.len();
        MultiError::check(errors).map_err(|source| StoreError::Replicas {
            operation,
            failed,
            source,
        })
    }
}

impl AStore for ReplicatedAStore {
    fn store(&self, afile: &AFile, content: &[u8]) -> StoreResult<()> {
        self.fan_out("store", |replica| replica.store(afile, content))
    }

    fn get(&self, afile: &AFile) -> StoreResult<Vec<u8>> {
        let mut errors = Vec::new();
        for replica in &self.replicas {
            match replica.get(afile) {
                Ok(content) => return Ok(content),
                Err(err) => errors.push(err),
            }
        }
        if errors.is_empty() || errors.iter().all(StoreError::is_not_found) {
            return Err(StoreError::NotFound(afile.key().id()));
        }
        Err(StoreError::Replicas {
            operation: "get",
            failed: errors.len(),
            source: MultiError::new(errors),
        })
    }

    fn delete(&self, afile: &AFile) -> StoreResult<()> {
        self.fan_out("delete", |replica| replica.delete(afile))
    }

    fn search(&self, start: Option<Hour>, end: Hour) -> StoreResult<Vec<AStoreSearchResult>> {
        let mut by_hour: BTreeMap<Hour, AStoreSearchResult> = BTreeMap::new();
        let mut errors = Vec::new();
        for replica in &self.replicas {
            match replica.search(start, end) {
                Ok(results) => {
                    for result in results {
                        by_hour
                            .entry(result.hour)
                            .or_insert_with(|| AStoreSearchResult::new(result.hour))
                            .afiles
                            .extend(result.afiles);
                    }
                }
                Err(err) => errors.push(err),
            }
        }
        let failed = errors.len();
        MultiError::check(errors).map_err(|source| StoreError::Replicas {
            operation: "search",
            failed,
            source,
        })?;
        Ok(by_hour.into_values().collect())
    }
}

impl fmt::Display for ReplicatedAStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} replica(s): ", self.replicas.len())?;
        for (i, replica) in self.replicas.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{replica}")?;
        }
        Ok(())
    }
}
