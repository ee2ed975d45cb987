use std::sync::Arc;

use hoard_archive::ArchiveContext;
use hoard_merge::WorkerPool;
use hoard_store::{
    AStore, DStore, DiskStorage, ObjectStorage, PersistedAStore, PersistedDStore,
    ReplicatedAStore, VerifyingStorage,
};

use crate::config::{Config, FeedConfig};
use crate::error::{TaskError, TaskResult};
use crate::metrics::{MetricsSink, NoopMetrics};

pub const DOWNLOADS_SUBDIR: &str = "downloads";
pub const ARCHIVES_SUBDIR: &str = "archives";

/// Everything the tasks of one feed need.
///
/// Sessions are independent of each other; the metrics sink and the merge
/// pool are the only shared pieces.
pub struct Session {
    feed: FeedConfig,
    ctx: ArchiveContext,
    merging: bool,
    local_dstore: Arc<dyn DStore>,
    local_astore: Arc<dyn AStore>,
    remote: Option<Arc<ReplicatedAStore>>,
    metrics: Arc<dyn MetricsSink>,
    pool: Arc<WorkerPool>,
}

impl Session {
    /// Local stores live under `{workspace}/downloads/{feed}` and
    /// `{workspace}/archives/{feed}`; each configured bucket becomes one
    /// replica of the remote store.
    pub fn open(
        config: &Config,
        feed: &FeedConfig,
        metrics: Arc<dyn MetricsSink>,
        pool: Arc<WorkerPool>,
    ) -> TaskResult<Self> {
        let [downloads, archives] = config.feed_dirs(feed);

        let mut replicas: Vec<Arc<dyn AStore>> = Vec::with_capacity(config.object_storage.len());
        for storage in &config.object_storage {
            let remote = ObjectStorage::connect(storage, &feed.id)?;
            tracing::debug!(feed = %feed.id, replica = %remote, "connected to object storage");
            replicas.push(Arc::new(PersistedAStore::new(Arc::new(VerifyingStorage::new(remote)))));
        }
        let remote = (!replicas.is_empty()).then(|| Arc::new(ReplicatedAStore::new(replicas)));

        Ok(Self {
            feed: feed.clone(),
            ctx: feed.archive_context(&config.assembler()),
            merging: !config.disable_merging,
            local_dstore: Arc::new(PersistedDStore::new(Arc::new(DiskStorage::new(downloads)))),
            local_astore: Arc::new(PersistedAStore::new(Arc::new(DiskStorage::new(archives)))),
            remote,
            metrics,
            pool,
        })
    }

    /// A session whose stores are all in memory, with `replicas` remote
    /// replicas.
    pub fn in_memory(feed: &FeedConfig, replicas: usize) -> Self {
        let remote = (replicas > 0).then(|| {
            Arc::new(ReplicatedAStore::new(
                (0..replicas)
                    .map(|_| Arc::new(PersistedAStore::in_memory()) as Arc<dyn AStore>)
                    .collect(),
            ))
        });
        Self {
            feed: feed.clone(),
            ctx: feed.archive_context("test"),
            merging: true,
            local_dstore: Arc::new(PersistedDStore::in_memory()),
            local_astore: Arc::new(PersistedAStore::in_memory()),
            remote,
            metrics: Arc::new(NoopMetrics),
            pool: Arc::new(WorkerPool::new(2)),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_merging(mut self, merging: bool) -> Self {
        self.merging = merging;
        self
    }

    pub fn feed(&self) -> &FeedConfig {
        &self.feed
    }

    pub fn id(&self) -> &str {
        &self.feed.id
    }

    pub fn archive_context(&self) -> &ArchiveContext {
        &self.ctx
    }

    pub fn merging_enabled(&self) -> bool {
        self.merging
    }

    pub fn local_dstore(&self) -> &dyn DStore {
        self.local_dstore.as_ref()
    }

    pub fn local_astore(&self) -> &Arc<dyn AStore> {
        &self.local_astore
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn remote(&self) -> TaskResult<&ReplicatedAStore> {
        self.remote.as_deref().ok_or(TaskError::NoRemoteStorage)
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}
