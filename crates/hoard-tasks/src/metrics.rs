//! Task outcome recording.
//!
//! Sinks are injected into each [`crate::Session`]; nothing here is global.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// The periodic tasks whose outcomes are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    Download,
    Pack,
    Merge,
    Upload,
    Audit,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Download => "download",
            TaskKind::Pack => "pack",
            TaskKind::Merge => "merge",
            TaskKind::Upload => "upload",
            TaskKind::Audit => "audit",
        };
        f.write_str(name)
    }
}

pub trait MetricsSink: Send + Sync {
    /// One run of `task` for `feed` finished.
    fn record_task(&self, feed: &str, task: TaskKind, success: bool);

    /// A download stored `bytes` new bytes.
    fn record_saved_download(&self, feed: &str, bytes: usize);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_task(&self, _feed: &str, _task: TaskKind, _success: bool) {}

    fn record_saved_download(&self, _feed: &str, _bytes: usize) {}
}

/// Emits each outcome as a debug-level tracing event.
#[derive(Debug, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_task(&self, feed: &str, task: TaskKind, success: bool) {
        tracing::debug!(feed, task = %task, success, "task finished");
    }

    fn record_saved_download(&self, feed: &str, bytes: usize) {
        tracing::debug!(feed, bytes, "download saved");
    }
}

#[derive(Debug, Default)]
struct Counts {
    runs: BTreeMap<(String, TaskKind, bool), u64>,
    saved_bytes: BTreeMap<String, u64>,
}

/// Keeps running totals in memory.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    counts: Mutex<Counts>,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs of `task` for `feed` with the given outcome.
    pub fn runs(&self, feed: &str, task: TaskKind, success: bool) -> u64 {
        let counts = self.counts.lock().expect("lock poisoned");
        counts
            .runs
            .get(&(feed.to_string(), task, success))
            .copied()
            .unwrap_or(0)
    }

    pub fn saved_bytes(&self, feed: &str) -> u64 {
        let counts = self.counts.lock().expect("lock poisoned");
        counts.saved_bytes.get(feed).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingMetrics {
    fn record_task(&self, feed: &str, task: TaskKind, success: bool) {
        let mut counts = self.counts.lock().expect("lock poisoned");
        *counts.runs.entry((feed.to_string(), task, success)).or_default() += 1;
    }

    fn record_saved_download(&self, feed: &str, bytes: usize) {
        let mut counts = self.counts.lock().expect("lock poisoned");
        *counts.saved_bytes.entry(feed.to_string()).or_default() += bytes as u64;
    }
}
