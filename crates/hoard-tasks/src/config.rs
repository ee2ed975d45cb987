use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hoard_archive::{ArchiveContext, UNKNOWN_ASSEMBLER};
use hoard_store::ObjectStorageConfig;
use hoard_types::CompressionSpec;
use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskResult};
use crate::session::{ARCHIVES_SUBDIR, DOWNLOADS_SUBDIR};

/// Top-level configuration, read from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the local download and archive stores.
    #[serde(default = "default_workspace")]
    pub workspace_path: PathBuf,
    #[serde(default = "one")]
    pub packs_per_hour: u32,
    #[serde(default = "one")]
    pub uploads_per_hour: u32,
    #[serde(default)]
    pub disable_merging: bool,
    /// Recorded in every archive manifest written by this process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembler: Option<String>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub object_storage: Vec<ObjectStorageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_path: default_workspace(),
            packs_per_hour: 1,
            uploads_per_hour: 1,
            disable_merging: false,
            assembler: None,
            feeds: Vec::new(),
            object_storage: Vec::new(),
        }
    }
}

fn default_workspace() -> PathBuf {
    PathBuf::from("workspace")
}

fn one() -> u32 {
    1
}

/// One polled feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub postfix: String,
    /// File name prefix; `{id}_` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default = "default_periodicity")]
    pub periodicity_secs: u64,
    #[serde(default)]
    pub compression: CompressionSpec,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_periodicity() -> u64 {
    5
}

impl FeedConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            postfix: String::new(),
            prefix: None,
            periodicity_secs: default_periodicity(),
            compression: CompressionSpec::default(),
            headers: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| format!("{}_", self.id))
    }

    pub fn periodicity(&self) -> Duration {
        Duration::from_secs(self.periodicity_secs)
    }

    /// Archive parameters for this feed.
    pub fn archive_context(&self, assembler: &str) -> ArchiveContext {
        ArchiveContext::new(self.prefix(), self.compression).with_assembler(assembler)
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> TaskResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TaskError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn validate(&self) -> TaskResult<()> {
        let mut ids = BTreeSet::new();
        for feed in &self.feeds {
            if feed.id.trim().is_empty() {
                return Err(TaskError::InvalidConfig("feed id must not be empty".into()));
            }
            if !ids.insert(feed.id.as_str()) {
                return Err(TaskError::InvalidConfig(format!("duplicate feed id {:?}", feed.id)));
            }
            if feed.periodicity_secs == 0 {
                return Err(TaskError::InvalidConfig(format!(
                    "feed {:?}: periodicity must be positive",
                    feed.id
                )));
            }
        }
        for (name, value) in [
            ("packs_per_hour", self.packs_per_hour),
            ("uploads_per_hour", self.uploads_per_hour),
        ] {
            if !(1..=60).contains(&value) {
                return Err(TaskError::InvalidConfig(format!(
                    "{name} must be between 1 and 60, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The configured assembler, else `$HOSTNAME`, else `unknown`.
    pub fn assembler(&self) -> String {
        self.assembler
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|host| !host.is_empty()))
            .unwrap_or_else(|| UNKNOWN_ASSEMBLER.to_string())
    }

    pub fn feed(&self, id: &str) -> TaskResult<&FeedConfig> {
        self.feeds
            .iter()
            .find(|feed| feed.id == id)
            .ok_or_else(|| TaskError::UnknownFeed(id.to_string()))
    }

    /// Keep only the feeds named in `ids`; an empty filter keeps every feed.
    /// The feed's local download and archive directories.
    pub fn feed_dirs(&self, feed: &FeedConfig) -> [PathBuf; 2] {
        [
            self.workspace_path.join(DOWNLOADS_SUBDIR).join(&feed.id),
            self.workspace_path.join(ARCHIVES_SUBDIR).join(&feed.id),
        ]
    }

    pub fn retain_feeds(&mut self, ids: &[String]) -> TaskResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for id in ids {
            self.feed(id)?;
        }
        self.feeds.retain(|feed| ids.contains(&feed.id));
        Ok(())
    }

    /// This configuration as TOML, with object storage secrets masked.
    pub fn to_redacted_toml(&self) -> TaskResult<String> {
        let mut redacted = self.clone();
        for storage in &mut redacted.object_storage {
            storage.secret_key = "<redacted>".into();
        }
        toml::to_string_pretty(&redacted).map_err(|e| TaskError::InvalidConfig(e.to_string()))
    }
}

impl std::str::FromStr for Config {
    type Err = TaskError;

    fn from_str(text: &str) -> TaskResult<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
