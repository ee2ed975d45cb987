use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use hoard_types::{CompressionFormat, CompressionSpec};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::error::{ArchiveError, ArchiveResult};

/// Compress `data` according to `spec`.
pub fn compress(data: &[u8], spec: CompressionSpec) -> ArchiveResult<Vec<u8>> {
    match spec.format() {
        CompressionFormat::Gzip => {
            // CompressionSpec clamps gzip levels to 1..=9.
            let level = flate2::Compression::new(spec.level().unsigned_abs());
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder
                .write_all(data)
                .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))
        }
        CompressionFormat::Xz => {
            let mut encoder = XzEncoder::new(Vec::new(), spec.level().unsigned_abs());
            encoder
                .write_all(data)
                .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| ArchiveError::CompressionFailed(e.to_string()))
        }
        CompressionFormat::Zstd => zstd::encode_all(data, spec.level())
            .map_err(|e| ArchiveError::CompressionFailed(e.to_string())),
    }
}

/// Decompress `data` that was produced in `format`.
pub fn decompress(data: &[u8], format: CompressionFormat) -> ArchiveResult<Vec<u8>> {
    match format {
        CompressionFormat::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::DecompressionFailed(e.to_string()))?;
            Ok(out)
        }
        CompressionFormat::Xz => {
            let mut decoder = XzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::DecompressionFailed(e.to_string()))?;
            Ok(out)
        }
        CompressionFormat::Zstd => {
            zstd::decode_all(data).map_err(|e| ArchiveError::DecompressionFailed(e.to_string()))
        }
    }
}
