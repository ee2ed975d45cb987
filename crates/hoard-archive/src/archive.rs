use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;

use chrono::Utc;
use hoard_store::{ReadableDStore, StoreError, StoreResult};
use hoard_types::{AFile, CompressionFormat, CompressionSpec, DFile, Hash, Hour};

use crate::codec;
use crate::error::{ArchiveError, ArchiveResult};
use crate::manifest::{Manifest, MAX_MANIFEST_DEPTH};

/// Name of the manifest entry inside a serialized archive.
pub const MANIFEST_NAME: &str = ".hoard_manifest.json";

/// Assembler recorded when none is configured.
pub const UNKNOWN_ASSEMBLER: &str = "unknown";

/// Mutable builder accumulating the DFiles of one hour.
///
/// Content is stored once per hash; every DFile identity is retained.
/// [`Archive::lock`] moves the accumulated state into an immutable
/// [`LockedArchive`] and leaves this builder empty.
#[derive(Debug)]
pub struct Archive {
    hour: Hour,
    assembler: String,
    dfiles: BTreeSet<DFile>,
    content: HashMap<Hash, Vec<u8>>,
    sources: Vec<Manifest>,
}

impl Archive {
    pub fn new(hour: Hour) -> Self {
        Self {
            hour,
            assembler: UNKNOWN_ASSEMBLER.to_string(),
            dfiles: BTreeSet::new(),
            content: HashMap::new(),
            sources: Vec::new(),
        }
    }

    /// Identity recorded in the manifest as the assembler of this archive.
    pub fn with_assembler(mut self, assembler: impl Into<String>) -> Self {
        self.assembler = assembler.into();
        self
    }

    pub fn hour(&self) -> Hour {
        self.hour
    }

    /// Number of DFile identities stored.
    pub fn len(&self) -> usize {
        self.dfiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dfiles.is_empty()
    }

    /// Add a DFile. The content must hash to the DFile's hash and the DFile
    /// must belong to this archive's hour.
    pub fn store(&mut self, dfile: DFile, content: Vec<u8>) -> ArchiveResult<()> {
        if dfile.hour() != self.hour {
            return Err(ArchiveError::WrongHour {
                dfile,
                hour: self.hour,
            });
        }
        let actual = Hash::of(&content);
        if actual != dfile.hash {
            return Err(ArchiveError::ContentMismatch { dfile, actual });
        }
        self.content.insert(dfile.hash, content);
        self.dfiles.insert(dfile);
        Ok(())
    }

    /// Record the manifest of an archive whose DFiles were copied into this
    /// one. Deep provenance trees are collapsed to keep the result within
    /// [`MAX_MANIFEST_DEPTH`].
    pub fn add_source_manifest(&mut self, manifest: &Manifest) {
        let mut manifest = manifest.clone();
        manifest.collapse_to_depth(MAX_MANIFEST_DEPTH - 1);
        self.sources.push(manifest);
    }

    /// Freeze the archive.
    pub fn lock(&mut self) -> LockedArchive {
        let fresh = Archive::new(self.hour).with_assembler(self.assembler.clone());
        let Archive {
            hour,
            assembler,
            dfiles,
            content,
            sources,
        } = std::mem::replace(self, fresh);

        let hash = canonical_hash(&dfiles);
        let mut from_sources = BTreeSet::new();
        for source in &sources {
            from_sources.extend(source.dfiles());
        }
        let source_downloads = dfiles.difference(&from_sources).cloned().collect();
        let missing_downloads = from_sources.difference(&dfiles).cloned().collect();

        LockedArchive {
            manifest: Manifest {
                hash,
                hour,
                assembler,
                assembly_time: Utc::now(),
                source_archives: sources,
                source_downloads,
                missing_downloads,
            },
            dfiles,
            content,
        }
    }
}

/// Hash of the concatenated names of `dfiles` in canonical order.
fn canonical_hash(dfiles: &BTreeSet<DFile>) -> Hash {
    let names: Vec<String> = dfiles.iter().map(DFile::name).collect();
    Hash::of_strings(names.iter().map(String::as_str))
}

/// An immutable archive: a set of DFiles, their content, and a manifest.
#[derive(Debug)]
pub struct LockedArchive {
    manifest: Manifest,
    dfiles: BTreeSet<DFile>,
    content: HashMap<Hash, Vec<u8>>,
}

impl LockedArchive {
    pub fn hash(&self) -> Hash {
        self.manifest.hash
    }

    pub fn hour(&self) -> Hour {
        self.manifest.hour
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Member DFiles in canonical order.
    pub fn dfiles(&self) -> impl Iterator<Item = &DFile> {
        self.dfiles.iter()
    }

    pub fn len(&self) -> usize {
        self.dfiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dfiles.is_empty()
    }

    /// The AFile identity of this archive for a feed prefix and format.
    pub fn afile(&self, prefix: &str, format: CompressionFormat) -> AFile {
        AFile::new(prefix, self.hour(), self.hash(), format)
    }

    /// Encode as a compressed tar: one entry per distinct hash, named after
    /// the first DFile carrying it, followed by the manifest.
    pub fn serialize(&self, spec: CompressionSpec) -> ArchiveResult<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut written = HashSet::new();
        for dfile in &self.dfiles {
            if !written.insert(dfile.hash) {
                continue;
            }
            let content = self
                .content
                .get(&dfile.hash)
                .ok_or_else(|| StoreError::NotFound(dfile.name()))?;
            append(&mut builder, &dfile.name(), dfile.time.timestamp(), content)?;
        }
        let manifest = serde_json::to_vec_pretty(&self.manifest)?;
        append(
            &mut builder,
            MANIFEST_NAME,
            self.manifest.assembly_time.timestamp(),
            &manifest,
        )?;
        let tarball = builder.into_inner()?;
        codec::compress(&tarball, spec)
    }

    /// Decode an archive produced by [`LockedArchive::serialize`].
    ///
    /// Membership comes from the manifest; if the manifest is absent or
    /// unreadable it is rebuilt from the entry names. Entries the manifest
    /// does not list are kept and manifest DFiles without content are
    /// dropped; either case yields a new manifest node and hash over the
    /// DFiles actually present. Entries whose name is not a DFile name, or
    /// whose bytes do not match their hash, make the whole archive corrupt.
    pub fn deserialize(bytes: &[u8], format: CompressionFormat) -> ArchiveResult<Self> {
        let tarball = codec::decompress(bytes, format)?;
        let mut archive = tar::Archive::new(tarball.as_slice());
        let mut content: HashMap<Hash, Vec<u8>> = HashMap::new();
        let mut named = BTreeSet::new();
        let mut manifest_bytes = None;

        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            if name == MANIFEST_NAME {
                manifest_bytes = Some(data);
                continue;
            }
            let dfile: DFile = name
                .parse()
                .map_err(|_| ArchiveError::UnrecognizedEntry(name.clone()))?;
            let actual = Hash::of(&data);
            if actual != dfile.hash {
                return Err(ArchiveError::ContentMismatch { dfile, actual });
            }
            content.insert(dfile.hash, data);
            named.insert(dfile);
        }

        let manifest = manifest_bytes.and_then(|bytes| match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                tracing::warn!(error = %err, "unreadable archive manifest, rebuilding from entry names");
                None
            }
        });

        match manifest {
            Some(manifest) => {
                let listed = manifest.dfiles();
                let mut dfiles = BTreeSet::new();
                for dfile in &listed {
                    if content.contains_key(&dfile.hash) {
                        dfiles.insert(dfile.clone());
                    } else {
                        tracing::warn!(dfile = %dfile, "archive manifest lists a download with no content");
                    }
                }
                for dfile in named.difference(&listed) {
                    tracing::warn!(dfile = %dfile, "archive entry missing from manifest");
                    dfiles.insert(dfile.clone());
                }
                if dfiles == listed {
                    return Ok(Self {
                        manifest,
                        dfiles,
                        content,
                    });
                }
                // Membership differs from the manifest: wrap it in a new node
                // that records the difference and rehash.
                let mut rebuilt = Archive::new(manifest.hour).with_assembler(manifest.assembler.clone());
                rebuilt.dfiles = dfiles;
                rebuilt.content = content;
                rebuilt.add_source_manifest(&manifest);
                Ok(rebuilt.lock())
            }
            None => {
                let hour = named.first().map(DFile::hour).ok_or(ArchiveError::Empty)?;
                let mut rebuilt = Archive::new(hour);
                rebuilt.dfiles = named;
                rebuilt.content = content;
                Ok(rebuilt.lock())
            }
        }
    }
}

fn append(
    builder: &mut tar::Builder<Vec<u8>>,
    name: &str,
    mtime: i64,
    data: &[u8],
) -> ArchiveResult<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o600);
    header.set_mtime(mtime.max(0) as u64);
    header.set_cksum();
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

impl ReadableDStore for LockedArchive {
    fn get(&self, dfile: &DFile) -> StoreResult<Vec<u8>> {
        if !self.dfiles.contains(dfile) {
            return Err(StoreError::NotFound(dfile.name()));
        }
        self.content
            .get(&dfile.hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(dfile.name()))
    }

    fn list_in_hour(&self, hour: Hour) -> StoreResult<Vec<DFile>> {
        if hour != self.hour() {
            return Ok(Vec::new());
        }
        Ok(self.dfiles.iter().cloned().collect())
    }

    fn list_non_empty_hours(&self) -> StoreResult<Vec<Hour>> {
        if self.dfiles.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![self.hour()])
    }
}
