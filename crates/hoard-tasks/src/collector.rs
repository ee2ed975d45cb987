//! The long-running collector: four periodic loops per feed.
//!
//! | Loop     | Schedule                                   |
//! |----------|--------------------------------------------|
//! | download | every `periodicity_secs`                   |
//! | pack     | `packs_per_hour` times an hour, from :02   |
//! | upload   | `uploads_per_hour` times an hour, from :12 |
//! | audit    | hourly at :35, over the last 24 hours      |
//!
//! Upload and audit only run when object storage is configured. Failures
//! are logged and recorded; the loops keep going.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{Timelike, Utc};
use crossbeam::channel::Receiver;
use hoard_merge::WorkerPool;
use hoard_types::Hour;

use crate::audit::{audit_once, AuditOptions};
use crate::config::Config;
use crate::download::{Downloader, FeedSource};
use crate::error::TaskResult;
use crate::metrics::MetricsSink;
use crate::pack::pack_once;
use crate::periodic::{run_periodically, Schedule};
use crate::session::Session;
use crate::upload::upload_once;

const PACK_OFFSET: Duration = Duration::from_secs(2 * 60);
const UPLOAD_OFFSET: Duration = Duration::from_secs(12 * 60);
const AUDIT_OFFSET: Duration = Duration::from_secs(35 * 60);
const AUDIT_LOOKBACK_HOURS: i64 = 24;
/// Downloads for the current hour are left unpacked this long after the
/// hour starts.
const CURRENT_HOUR_GRACE_MINUTES: u32 = 10;

pub struct Collector {
    config: Config,
    source: Arc<dyn FeedSource>,
    metrics: Arc<dyn MetricsSink>,
    pool: Arc<WorkerPool>,
}

impl Collector {
    pub fn new(config: Config, source: Arc<dyn FeedSource>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            config,
            source,
            metrics,
            pool: Arc::new(WorkerPool::with_available_parallelism()),
        }
    }

    /// Run every feed's loops until `shutdown` yields or disconnects.
    ///
    /// Sessions are opened up front, so a configuration error fails before
    /// any loop starts.
    pub fn run(&self, shutdown: &Receiver<()>) -> TaskResult<()> {
        let sessions = self
            .config
            .feeds
            .iter()
            .map(|feed| {
                Session::open(&self.config, feed, Arc::clone(&self.metrics), Arc::clone(&self.pool))
            })
            .collect::<TaskResult<Vec<_>>>()?;
        tracing::info!(feeds = sessions.len(), "collector started");

        thread::scope(|scope| {
            for session in &sessions {
                self.spawn_loops(scope, session, shutdown);
            }
        });
        tracing::info!("collector stopped");
        Ok(())
    }

    fn spawn_loops<'scope, 'env>(
        &'env self,
        scope: &'scope thread::Scope<'scope, 'env>,
        session: &'env Session,
        shutdown: &'env Receiver<()>,
    ) {
        let source = self.source.as_ref();
        scope.spawn(move || {
            let mut downloader = Downloader::new(session, source);
            let schedule = Schedule::Every(session.feed().periodicity());
            run_periodically("download", shutdown, schedule, || {
                if let Err(err) = downloader.download() {
                    tracing::warn!(feed = %session.id(), error = %err, "download failed");
                }
            });
        });

        let packs = Schedule::PerHour {
            times: self.config.packs_per_hour,
            offset: PACK_OFFSET,
        };
        scope.spawn(move || {
            run_periodically("pack", shutdown, packs, || {
                let now = Utc::now();
                let skip = (now.minute() < CURRENT_HOUR_GRACE_MINUTES).then(|| Hour::containing(now));
                if let Err(err) = pack_once(session, skip) {
                    tracing::error!(feed = %session.id(), error = %err, "pack failed");
                }
            });
        });

        if !session.has_remote() {
            tracing::warn!(
                feed = %session.id(),
                "no object storage configured; upload and audit will not run"
            );
            return;
        }

        let uploads = Schedule::PerHour {
            times: self.config.uploads_per_hour,
            offset: UPLOAD_OFFSET,
        };
        scope.spawn(move || {
            run_periodically("upload", shutdown, uploads, || {
                if let Err(err) = upload_once(session) {
                    tracing::error!(feed = %session.id(), error = %err, "upload failed");
                }
            });
        });

        let audits = Schedule::PerHour {
            times: 1,
            offset: AUDIT_OFFSET,
        };
        scope.spawn(move || {
            run_periodically("audit", shutdown, audits, || {
                let options = AuditOptions::recent(Hour::now(), AUDIT_LOOKBACK_HOURS);
                if let Err(err) = audit_once(session, options) {
                    tracing::error!(feed = %session.id(), error = %err, "audit failed");
                }
            });
        });
    }
}
