use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::Hash;
use crate::hour::Hour;

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

static DFILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?)(?P<time>\d{8}T\d{6}\.\d{3}Z)_(?P<hash>[a-z2-7]{12})(?P<postfix>.*)$")
        .expect("valid regex")
});

/// One downloaded feed payload.
///
/// The file name is `{prefix}{YYYYMMDDTHHMMSS.mmmZ}_{hash}{postfix}`. Two
/// DFiles with the same hash carry identical bytes but remain distinct
/// identities.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DFile {
    pub prefix: String,
    pub postfix: String,
    pub time: DateTime<Utc>,
    pub hash: Hash,
}

impl DFile {
    /// Capture time is truncated to millisecond precision so that the name
    /// round-trips exactly.
    pub fn new(
        prefix: impl Into<String>,
        postfix: impl Into<String>,
        time: DateTime<Utc>,
        hash: Hash,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            postfix: postfix.into(),
            time: time.trunc_subsecs(3),
            hash,
        }
    }

    pub fn hour(&self) -> Hour {
        Hour::containing(self.time)
    }

    /// Canonical name, also used as the hashing encoding of the DFile.
    pub fn name(&self) -> String {
        format!(
            "{}{}_{}{}",
            self.prefix,
            self.time.format(TIME_FORMAT),
            self.hash,
            self.postfix
        )
    }
}

impl FromStr for DFile {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidDFileName(s.to_string());
        let caps = DFILE_NAME.captures(s).ok_or_else(invalid)?;
        let time = NaiveDateTime::parse_from_str(&caps["time"], TIME_FORMAT).map_err(|_| invalid())?;
        let hash: Hash = caps["hash"].parse().map_err(|_| invalid())?;
        let dfile = DFile::new(&caps["prefix"], &caps["postfix"], Utc.from_utc_datetime(&time), hash);
        if dfile.name() != s {
            return Err(invalid());
        }
        Ok(dfile)
    }
}

impl Ord for DFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.hash.cmp(&other.hash))
            .then_with(|| self.prefix.cmp(&other.prefix))
            .then_with(|| self.postfix.cmp(&other.postfix))
    }
}

impl PartialOrd for DFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for DFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DFile({})", self.name())
    }
}

impl fmt::Display for DFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
