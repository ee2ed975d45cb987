use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TypeError, TypeResult};
use crate::key::Prefix;

/// A UTC timestamp truncated to one-hour resolution.
///
/// `Hour` is the sole partition key of every store. It is totally ordered by
/// wall-clock time and maps onto the four-level storage prefix
/// `YYYY/MM/DD/HH`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hour(DateTime<Utc>);

impl Hour {
    /// Build an hour from calendar components. Fails for impossible dates.
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> TypeResult<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .map(Self)
            .ok_or_else(|| {
                TypeError::InvalidHour(format!("{year:04}-{month:02}-{day:02}T{hour:02}"))
            })
    }

    /// The hour containing `time`.
    pub fn containing(time: DateTime<Utc>) -> Self {
        let date = time.date_naive();
        let truncated = date
            .and_hms_opt(time.hour(), 0, 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        Self(Utc.from_utc_datetime(&truncated))
    }

    /// The current hour.
    pub fn now() -> Self {
        Self::containing(Utc::now())
    }

    /// The latest representable hour; used as an unbounded range end.
    pub fn max() -> Self {
        Self::containing(DateTime::<Utc>::MAX_UTC)
    }

    /// Parse a four-component persistence prefix (`["2020","02","03","04"]`).
    pub fn from_prefix(prefix: &Prefix) -> Option<Self> {
        let [year, month, day, hour] = prefix.parts() else {
            return None;
        };
        if month.len() != 2 || day.len() != 2 || hour.len() != 2 {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
        let time = date.and_hms_opt(hour.parse().ok()?, 0, 0)?;
        Some(Self(Utc.from_utc_datetime(&time)))
    }

    /// Storage prefix `["YYYY", "MM", "DD", "HH"]`.
    pub fn persistence_prefix(&self) -> Prefix {
        let t = self.0;
        Prefix::new([
            format!("{:04}", t.year()),
            format!("{:02}", t.month()),
            format!("{:02}", t.day()),
            format!("{:02}", t.hour()),
        ])
    }

    /// Compact form used in archive file names, e.g. `20200203T04Z`.
    pub fn iso8601(&self) -> String {
        self.0.format("%Y%m%dT%HZ").to_string()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn add(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }

    /// Number of whole hours from `other` to `self`.
    pub fn hours_since(&self, other: Hour) -> i64 {
        (self.0 - other.0).num_hours()
    }

    /// Inclusive range check. A missing `start` is unbounded.
    pub fn is_between(&self, start: Option<Hour>, end: Hour) -> bool {
        if *self > end {
            return false;
        }
        match start {
            Some(start) => *self >= start,
            None => true,
        }
    }
}

impl fmt::Debug for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hour({self})")
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y/%m/%d/%H"))
    }
}
/// Accepts `YYYY-MM-DDTHH`, `YYYY-MM-DD` (midnight) or a full RFC 3339
/// timestamp, which is truncated.
impl FromStr for Hour {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let s = s.trim();
        if let Ok(time) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::containing(time.with_timezone(&Utc)));
        }
        let invalid = || TypeError::InvalidHour(s.to_string());
        let (date, hour) = match s.split_once('T') {
            Some((date, hour)) => (date, hour.parse::<u32>().map_err(|_| invalid())?),
            None => (s, 0),
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
        Self::new(date.year(), date.month(), date.day(), hour)
    }
}

impl From<DateTime<Utc>> for Hour {
    fn from(time: DateTime<Utc>) -> Self {
        Self::containing(time)
    }
}

impl Serialize for Hour {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Hour {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DateTime::<Utc>::deserialize(deserializer).map(Self::containing)
    }
}
