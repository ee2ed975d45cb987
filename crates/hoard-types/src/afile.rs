use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::compression::CompressionFormat;
use crate::error::TypeError;
use crate::hash::Hash;
use crate::hour::Hour;
use crate::key::Key;

static AFILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>.*?)(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})T(?P<hour>\d{2})Z_(?P<hash>[a-z2-7]{12})\.tar\.(?P<ext>[a-z]+)$",
    )
    .expect("valid regex")
});

/// One hourly archive object.
///
/// The file name is `{prefix}{YYYYMMDDTHHZ}_{hash}.tar.{ext}` and is stored
/// under the hour's four-level prefix. The name records the compression
/// format; the level used to produce the bytes is not part of the identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AFile {
    pub prefix: String,
    pub hour: Hour,
    pub hash: Hash,
    pub compression: CompressionFormat,
}

impl AFile {
    pub fn new(prefix: impl Into<String>, hour: Hour, hash: Hash, compression: CompressionFormat) -> Self {
        Self {
            prefix: prefix.into(),
            hour,
            hash,
            compression,
        }
    }

    pub fn name(&self) -> String {
        format!(
            "{}{}_{}.tar.{}",
            self.prefix,
            self.hour.iso8601(),
            self.hash,
            self.compression.extension()
        )
    }

    /// `YYYY/MM/DD/HH/{name}`.
    pub fn key(&self) -> Key {
        Key::new(self.hour.persistence_prefix(), self.name())
    }

    /// The same archive identity with a different compression format.
    pub fn with_compression(&self, compression: CompressionFormat) -> Self {
        Self {
            compression,
            ..self.clone()
        }
    }
}

impl FromStr for AFile {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidAFileName(s.to_string());
        let caps = AFILE_NAME.captures(s).ok_or_else(invalid)?;
        let num = |name: &str| caps[name].parse::<u32>().map_err(|_| invalid());
        let year = caps["year"].parse::<i32>().map_err(|_| invalid())?;
        let hour = Hour::new(year, num("month")?, num("day")?, num("hour")?).map_err(|_| invalid())?;
        let hash: Hash = caps["hash"].parse().map_err(|_| invalid())?;
        let compression = CompressionFormat::from_extension(&caps["ext"]).ok_or_else(invalid)?;
        let afile = AFile::new(&caps["prefix"], hour, hash, compression);
        if afile.name() != s {
            return Err(invalid());
        }
        Ok(afile)
    }
}

impl fmt::Debug for AFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AFile({})", self.name())
    }
}

impl fmt::Display for AFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
