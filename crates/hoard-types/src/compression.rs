use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Supported archive compression formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    Gzip,
    Xz,
    Zstd,
}

impl CompressionFormat {
    pub const ALL: [CompressionFormat; 3] = [
        CompressionFormat::Gzip,
        CompressionFormat::Xz,
        CompressionFormat::Zstd,
    ];

    /// File extension following `.tar.` in archive names.
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionFormat::Gzip => "gz",
            CompressionFormat::Xz => "xz",
            CompressionFormat::Zstd => "zstd",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.extension() == ext)
    }

    pub fn min_level(&self) -> i32 {
        match self {
            CompressionFormat::Xz => 0,
            CompressionFormat::Gzip | CompressionFormat::Zstd => 1,
        }
    }

    pub fn max_level(&self) -> i32 {
        match self {
            CompressionFormat::Gzip | CompressionFormat::Xz => 9,
            CompressionFormat::Zstd => 19,
        }
    }

    pub fn default_level(&self) -> i32 {
        match self {
            CompressionFormat::Gzip | CompressionFormat::Xz => 6,
            CompressionFormat::Zstd => 3,
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionFormat::Gzip => f.write_str("gzip"),
            CompressionFormat::Xz => f.write_str("xz"),
            CompressionFormat::Zstd => f.write_str("zstd"),
        }
    }
}

impl FromStr for CompressionFormat {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(CompressionFormat::Gzip),
            "xz" => Ok(CompressionFormat::Xz),
            "zstd" | "zst" => Ok(CompressionFormat::Zstd),
            other => Err(TypeError::UnknownCompressionFormat(other.to_string())),
        }
    }
}

/// A compression format plus level.
///
/// The level is clamped into the format's valid range on construction, so a
/// spec always holds its effective level. Two specs compare equal iff their
/// formats and effective levels are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawCompressionSpec", into = "RawCompressionSpec")]
pub struct CompressionSpec {
    format: CompressionFormat,
    level: i32,
}

impl CompressionSpec {
    /// The format's default level.
    pub fn new(format: CompressionFormat) -> Self {
        Self {
            format,
            level: format.default_level(),
        }
    }

    /// An explicit level, clamped into the format's range.
    pub fn with_level(format: CompressionFormat, level: i32) -> Self {
        Self {
            format,
            level: level.clamp(format.min_level(), format.max_level()),
        }
    }

    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for CompressionSpec {
    fn default() -> Self {
        Self::new(CompressionFormat::Gzip)
    }
}

impl fmt::Display for CompressionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (level {})", self.format, self.level)
    }
}

/// Configuration form: the level may be omitted.
#[derive(Serialize, Deserialize)]
struct RawCompressionSpec {
    format: CompressionFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<i32>,
}

impl From<RawCompressionSpec> for CompressionSpec {
    fn from(raw: RawCompressionSpec) -> Self {
        match raw.level {
            Some(level) => CompressionSpec::with_level(raw.format, level),
            None => CompressionSpec::new(raw.format),
        }
    }
}

impl From<CompressionSpec> for RawCompressionSpec {
    fn from(spec: CompressionSpec) -> Self {
        RawCompressionSpec {
            format: spec.format,
            level: Some(spec.level),
        }
    }
}
