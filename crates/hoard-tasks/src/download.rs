use std::time::Duration;

use chrono::{DateTime, Utc};
use hoard_store::DStore;
use hoard_types::{DFile, Hash};

use crate::config::FeedConfig;
use crate::error::{TaskError, TaskResult};
use crate::metrics::TaskKind;
use crate::session::Session;

/// Fetches the current payload of a feed.
pub trait FeedSource: Send + Sync {
    fn fetch(&self, feed: &FeedConfig) -> TaskResult<Vec<u8>>;
}

/// Polls feeds over HTTP(S) with a blocking client.
pub struct HttpFeedSource {
    client: reqwest::blocking::Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> TaskResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Fetch {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self, feed: &FeedConfig) -> TaskResult<Vec<u8>> {
        let fetch_failed = |e: reqwest::Error| TaskError::Fetch {
            url: feed.url.clone(),
            reason: e.to_string(),
        };
        let mut request = self.client.get(&feed.url);
        for (name, value) in &feed.headers {
            request = request.header(name, value);
        }
        let response = request.send().map_err(fetch_failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::HttpStatus {
                url: feed.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().map_err(fetch_failed)?.to_vec())
    }
}

/// Downloads one feed, skipping payloads identical to the previous one.
pub struct Downloader<'a> {
    session: &'a Session,
    source: &'a dyn FeedSource,
    last_hash: Option<Hash>,
}

impl<'a> Downloader<'a> {
    pub fn new(session: &'a Session, source: &'a dyn FeedSource) -> Self {
        Self {
            session,
            source,
            last_hash: None,
        }
    }

    /// Fetch once at `now`. Returns the DFile describing the payload, or
    /// `None` when it repeats the previous download and nothing was stored.
    pub fn download_at(&mut self, now: DateTime<Utc>) -> TaskResult<Option<DFile>> {
        let result = self.fetch_and_store(now);
        self.session
            .metrics()
            .record_task(self.session.id(), TaskKind::Download, result.is_ok());
        result
    }

    pub fn download(&mut self) -> TaskResult<Option<DFile>> {
        self.download_at(Utc::now())
    }

    fn fetch_and_store(&mut self, now: DateTime<Utc>) -> TaskResult<Option<DFile>> {
        let feed = self.session.feed();
        let content = self.source.fetch(feed)?;
        let hash = Hash::of(&content);
        if self.last_hash == Some(hash) {
            tracing::debug!(feed = %feed.id, hash = %hash, "payload unchanged");
            return Ok(None);
        }
        let dfile = DFile::new(feed.prefix(), feed.postfix.clone(), now, hash);
        self.session.local_dstore().store(&dfile, &content)?;
        self.last_hash = Some(hash);
        self.session
            .metrics()
            .record_saved_download(&feed.id, content.len());
        tracing::debug!(feed = %feed.id, dfile = %dfile, bytes = content.len(), "download saved");
        Ok(Some(dfile))
    }
}
