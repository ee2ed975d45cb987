//! Archive operations against stores: pack, read, unpack and recompress.

use hoard_store::{AStore, DStore, ReadableDStore};
use hoard_types::{AFile, CompressionSpec, DFile, Hour};

use crate::archive::{Archive, LockedArchive, UNKNOWN_ASSEMBLER};
use crate::error::{ArchiveError, ArchiveResult};

/// Per-feed parameters for writing archives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveContext {
    /// File name prefix of every AFile written.
    pub prefix: String,
    pub compression: CompressionSpec,
    /// Recorded in each manifest.
    pub assembler: String,
}

impl ArchiveContext {
    pub fn new(prefix: impl Into<String>, compression: CompressionSpec) -> Self {
        Self {
            prefix: prefix.into(),
            compression,
            assembler: UNKNOWN_ASSEMBLER.to_string(),
        }
    }

    pub fn with_assembler(mut self, assembler: impl Into<String>) -> Self {
        self.assembler = assembler.into();
        self
    }

    /// A fresh builder for `hour` carrying this context's assembler.
    pub fn archive(&self, hour: Hour) -> Archive {
        Archive::new(hour).with_assembler(self.assembler.clone())
    }
}

/// Fetch and decode an AFile.
pub fn read(afile: &AFile, source: &dyn AStore) -> ArchiveResult<LockedArchive> {
    let bytes = source.get(afile)?;
    LockedArchive::deserialize(&bytes, afile.compression)
}

/// Encode a locked archive under the context and store it.
pub fn write(
    locked: &LockedArchive,
    ctx: &ArchiveContext,
    target: &dyn AStore,
) -> ArchiveResult<AFile> {
    let afile = locked.afile(&ctx.prefix, ctx.compression.format());
    let bytes = locked.serialize(ctx.compression)?;
    target.store(&afile, &bytes)?;
    tracing::debug!(
        afile = %afile,
        downloads = locked.len(),
        bytes = bytes.len(),
        "archive written"
    );
    Ok(afile)
}

/// Pack `dfiles` of one hour into a new AFile in `target`.
///
/// DFiles that cannot be read from `source` are logged and left out.
/// Returns the AFile written and the DFiles it actually contains; only those
/// are safe to delete from `source`.
pub fn create_from_dfiles(
    ctx: &ArchiveContext,
    hour: Hour,
    dfiles: &[DFile],
    source: &dyn ReadableDStore,
    target: &dyn AStore,
) -> ArchiveResult<(AFile, Vec<DFile>)> {
    let mut archive = ctx.archive(hour);
    let mut packed = Vec::with_capacity(dfiles.len());
    for dfile in dfiles {
        let content = match source.get(dfile) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(dfile = %dfile, error = %err, "skipping unreadable download");
                continue;
            }
        };
        match archive.store(dfile.clone(), content) {
            Ok(()) => packed.push(dfile.clone()),
            Err(err) => tracing::warn!(dfile = %dfile, error = %err, "skipping download"),
        }
    }
    if archive.is_empty() {
        return Err(ArchiveError::Empty);
    }
    let locked = archive.lock();
    let afile = write(&locked, ctx, target)?;
    Ok((afile, packed))
}

/// Write every member of `afile` into `target`. Returns the number of
/// DFiles written.
pub fn unpack(afile: &AFile, source: &dyn AStore, target: &dyn DStore) -> ArchiveResult<usize> {
    let locked = read(afile, source)?;
    let mut written = 0;
    for dfile in locked.dfiles() {
        let content = locked.get(dfile)?;
        target.store(dfile, &content)?;
        written += 1;
    }
    tracing::debug!(afile = %afile, downloads = written, "archive unpacked");
    Ok(written)
}

/// Re-encode `afile` under the context's compression and store the result
/// in `target`. The manifest, and therefore the hash, are preserved; the
/// original is left in place.
pub fn recompress(
    ctx: &ArchiveContext,
    afile: &AFile,
    source: &dyn AStore,
    target: &dyn AStore,
) -> ArchiveResult<AFile> {
    let locked = read(afile, source)?;
    let recompressed = afile.with_compression(ctx.compression.format());
    let bytes = locked.serialize(ctx.compression)?;
    target.store(&recompressed, &bytes)?;
    tracing::debug!(from = %afile, to = %recompressed, "archive recompressed");
    Ok(recompressed)
}
