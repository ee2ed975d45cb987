use std::sync::Arc;

use hoard_archive::{read, write, ArchiveContext};
use hoard_store::{AStore, ReadableDStore};
use hoard_types::{AFile, Hour, MultiError};

use crate::error::{MergeError, MergeResult};
use crate::pool::{ErrorGroup, WorkerPool};

/// Consolidate every AFile of `hour` in `store` into one.
///
/// Sources that cannot be fetched or decoded are logged, skipped and left
/// in place. Once the merged AFile is stored, every source it incorporates
/// is deleted, except a source identical to the result. Delete failures are
/// logged only; the next merge picks the leftovers up again.
pub fn merge_hour(ctx: &ArchiveContext, store: &dyn AStore, hour: Hour) -> MergeResult<AFile> {
    let afiles = store.list_in_hour(hour)?;
    match afiles.as_slice() {
        [] => return Err(MergeError::EmptyHour(hour)),
        [single] => return Ok(single.clone()),
        _ => {}
    }
    tracing::debug!(hour = %hour, sources = afiles.len(), "merging hour");

    let mut archive = ctx.archive(hour);
    let mut incorporated = Vec::with_capacity(afiles.len());
    let mut unreadable = Vec::new();
    for afile in &afiles {
        let source = match read(afile, store) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(afile = %afile, error = %err, "skipping unreadable archive");
                unreadable.push(err);
                continue;
            }
        };
        for dfile in source.dfiles() {
            let copy_failed = |reason: String| MergeError::CopyFailed {
                afile: afile.clone(),
                dfile: dfile.clone(),
                reason,
            };
            let content = source.get(dfile).map_err(|err| copy_failed(err.to_string()))?;
            archive
                .store(dfile.clone(), content)
                .map_err(|err| copy_failed(err.to_string()))?;
        }
        archive.add_source_manifest(source.manifest());
        incorporated.push(afile.clone());
    }
    if incorporated.is_empty() {
        return Err(MergeError::NoReadableSources {
            hour,
            source: MultiError::new(unreadable),
        });
    }

    let locked = archive.lock();
    let merged = write(&locked, ctx, store)?;
    for afile in incorporated.iter().filter(|afile| **afile != merged) {
        if let Err(err) = store.delete(afile) {
            tracing::warn!(afile = %afile, error = %err, "failed to delete merged archive");
        }
    }
    tracing::info!(
        hour = %hour,
        afile = %merged,
        sources = incorporated.len(),
        downloads = locked.len(),
        "merged hour"
    );
    Ok(merged)
}

/// Result of merging every hour of a store.
#[derive(Debug)]
pub struct MergeReport {
    /// One AFile per hour that merged successfully, in hour order.
    pub merged: Vec<AFile>,
    /// Every failure combined, if any hour failed.
    pub failure: Option<MergeError>,
}

impl MergeReport {
    pub fn into_result(self) -> MergeResult<Vec<AFile>> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.merged),
        }
    }
}

/// Merge every non-empty hour of `store`, one pool job per hour.
pub fn merge_all(ctx: &ArchiveContext, store: Arc<dyn AStore>, pool: &WorkerPool) -> MergeReport {
    let hours = match store.list_non_empty_hours() {
        Ok(hours) => hours,
        Err(err) => {
            return MergeReport {
                merged: Vec::new(),
                failure: Some(err.into()),
            }
        }
    };

    let mut group = ErrorGroup::new();
    for hour in hours {
        let completion = group.add();
        let ctx = ctx.clone();
        let store = Arc::clone(&store);
        pool.execute(move || {
            let result = merge_hour(&ctx, store.as_ref(), hour);
            if let Err(err) = &result {
                tracing::error!(hour = %hour, error = %err, "failed to merge hour");
            }
            completion.done(result);
        });
    }

    let outcome = group.wait();
    let mut merged = outcome.values;
    merged.sort_by_key(|afile| afile.hour);
    let mut errors = outcome.errors;
    if outcome.abandoned > 0 {
        errors.push(MergeError::Abandoned(outcome.abandoned));
    }
    MergeReport {
        merged,
        failure: combine(errors),
    }
}

fn combine(mut errors: Vec<MergeError>) -> Option<MergeError> {
    match errors.len() {
        0 => None,
        1 => errors.pop(),
        _ => Some(MergeError::Multiple(MultiError::new(errors))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use hoard_archive::{codec, Archive, MANIFEST_NAME};
    use hoard_store::PersistedAStore;
    use hoard_types::{CompressionFormat, CompressionSpec, DFile, Hash};

    fn hour(h: u32) -> Hour {
        Hour::new(2023, 7, 8, h).unwrap()
    }

    fn dfile(h: u32, second: i64, content: &[u8]) -> DFile {
        let time = Utc.with_ymd_and_hms(2023, 7, 8, h, 0, 0).unwrap() + Duration::seconds(second);
        DFile::new("train_", ".json", time, Hash::of(content))
    }

    fn ctx() -> ArchiveContext {
        ArchiveContext::new("train_", CompressionSpec::new(CompressionFormat::Gzip))
    }

    fn put_archive(store: &dyn AStore, h: u32, items: &[(i64, &[u8])]) -> AFile {
        let mut archive = Archive::new(hour(h));
        for (second, content) in items {
            archive.store(dfile(h, *second, content), content.to_vec()).unwrap();
        }
        write(&archive.lock(), &ctx(), store).unwrap()
    }

    fn put_garbage(store: &dyn AStore, h: u32, seed: &[u8]) -> AFile {
        let afile = AFile::new("train_", hour(h), Hash::of(seed), CompressionFormat::Gzip);
        store.store(&afile, b"not an archive").unwrap();
        afile
    }

    /// An archive in hour 1 whose tar holds `entries` but whose manifest
    /// only lists `listed`.
    fn put_underlisted(store: &dyn AStore, listed: &[(i64, &[u8])], entries: &[(i64, &[u8])]) -> AFile {
        let mut manifest_source = Archive::new(hour(1));
        for (second, content) in listed {
            manifest_source.store(dfile(1, *second, content), content.to_vec()).unwrap();
        }
        let manifest = manifest_source.lock().manifest().clone();

        let mut builder = tar::Builder::new(Vec::new());
        let mut add = |name: &str, data: &[u8]| {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o600);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        };
        for (second, content) in entries {
            add(&dfile(1, *second, content).name(), content);
        }
        add(MANIFEST_NAME, &serde_json::to_vec(&manifest).unwrap());
        let tarball = builder.into_inner().unwrap();
        let bytes = codec::compress(&tarball, CompressionSpec::new(CompressionFormat::Gzip)).unwrap();

        let afile = AFile::new("train_", hour(1), manifest.hash, CompressionFormat::Gzip);
        store.store(&afile, &bytes).unwrap();
        afile
    }

    fn members(store: &dyn AStore, afile: &AFile) -> Vec<DFile> {
        read(afile, store).unwrap().dfiles().cloned().collect()
    }

    // ---------------------------------------------------------------
    // merge_hour
    // ---------------------------------------------------------------

    #[test]
    fn empty_hour_is_an_error() {
        let store = PersistedAStore::in_memory();
        assert!(matches!(merge_hour(&ctx(), &store, hour(1)), Err(MergeError::EmptyHour(_))));
    }

    #[test]
    fn single_afile_is_returned_untouched() {
        let store = PersistedAStore::in_memory();
        let only = put_archive(&store, 1, &[(0, b"a")]);
        let before = store.get(&only).unwrap();
        assert_eq!(merge_hour(&ctx(), &store, hour(1)).unwrap(), only);
        assert_eq!(store.get(&only).unwrap(), before);
    }

    #[test]
    fn disjoint_archives_merge_into_union() {
        let store = PersistedAStore::in_memory();
        put_archive(&store, 1, &[(0, b"a"), (1, b"b")]);
        put_archive(&store, 1, &[(2, b"c"), (3, b"a")]);

        let merged = merge_hour(&ctx(), &store, hour(1)).unwrap();
        assert_eq!(store.list_in_hour(hour(1)).unwrap(), vec![merged.clone()]);
        assert_eq!(
            members(&store, &merged),
            vec![dfile(1, 0, b"a"), dfile(1, 1, b"b"), dfile(1, 2, b"c"), dfile(1, 3, b"a")]
        );
        let merged_archive = read(&merged, &store).unwrap();
        assert_eq!(merged_archive.manifest().source_archives.len(), 2);
        assert!(merged_archive.manifest().source_downloads.is_empty());
    }

    #[test]
    fn subset_merges_into_existing_afile() {
        let store = PersistedAStore::in_memory();
        let full = put_archive(&store, 1, &[(0, b"a"), (1, b"b")]);
        put_archive(&store, 1, &[(1, b"b")]);

        let merged = merge_hour(&ctx(), &store, hour(1)).unwrap();
        assert_eq!(merged, full);
        assert_eq!(store.list_in_hour(hour(1)).unwrap(), vec![full.clone()]);
        assert_eq!(members(&store, &full).len(), 2);
    }

    #[test]
    fn merging_again_is_a_noop() {
        let store = PersistedAStore::in_memory();
        put_archive(&store, 1, &[(0, b"a")]);
        put_archive(&store, 1, &[(1, b"b")]);
        let first = merge_hour(&ctx(), &store, hour(1)).unwrap();
        let second = merge_hour(&ctx(), &store, hour(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list_in_hour(hour(1)).unwrap().len(), 1);
    }

    #[test]
    fn merged_hash_ignores_source_grouping() {
        let grouped = PersistedAStore::in_memory();
        put_archive(&grouped, 1, &[(0, b"a"), (1, b"b")]);
        put_archive(&grouped, 1, &[(2, b"c")]);
        let regrouped = PersistedAStore::in_memory();
        put_archive(&regrouped, 1, &[(0, b"a")]);
        put_archive(&regrouped, 1, &[(1, b"b"), (2, b"c")]);

        let x = merge_hour(&ctx(), &grouped, hour(1)).unwrap();
        let y = merge_hour(&ctx(), &regrouped, hour(1)).unwrap();
        assert_eq!(x.hash, y.hash);
    }

    #[test]
    fn merged_in_steps_equals_merged_at_once() {
        let stepwise = PersistedAStore::in_memory();
        put_archive(&stepwise, 1, &[(0, b"a")]);
        put_archive(&stepwise, 1, &[(1, b"b")]);
        merge_hour(&ctx(), &stepwise, hour(1)).unwrap();
        put_archive(&stepwise, 1, &[(2, b"c")]);
        let two_steps = merge_hour(&ctx(), &stepwise, hour(1)).unwrap();

        let at_once = PersistedAStore::in_memory();
        put_archive(&at_once, 1, &[(0, b"a")]);
        put_archive(&at_once, 1, &[(1, b"b")]);
        put_archive(&at_once, 1, &[(2, b"c")]);
        let one_step = merge_hour(&ctx(), &at_once, hour(1)).unwrap();

        assert_eq!(two_steps, one_step);
        assert_eq!(members(&stepwise, &two_steps), members(&at_once, &one_step));
        assert_eq!(stepwise.list_in_hour(hour(1)).unwrap(), vec![two_steps]);
    }

    #[test]
    fn entries_missing_from_source_manifest_survive_merge() {
        let store = PersistedAStore::in_memory();
        let underlisted = put_underlisted(&store, &[(0, b"a")], &[(0, b"a"), (1, b"b")]);
        put_archive(&store, 1, &[(2, b"c")]);

        let merged = merge_hour(&ctx(), &store, hour(1)).unwrap();
        assert_eq!(store.list_in_hour(hour(1)).unwrap(), vec![merged.clone()]);
        assert!(store.get(&underlisted).is_err());
        assert_eq!(
            members(&store, &merged),
            vec![dfile(1, 0, b"a"), dfile(1, 1, b"b"), dfile(1, 2, b"c")]
        );
        let archive = read(&merged, &store).unwrap();
        assert_eq!(archive.get(&dfile(1, 1, b"b")).unwrap(), b"b");
    }

    #[test]
    fn misfiled_source_aborts_without_changes() {
        let store = PersistedAStore::in_memory();
        put_archive(&store, 1, &[(0, b"a")]);
        let mut other_hour = Archive::new(hour(2));
        other_hour.store(dfile(2, 0, b"z"), b"z".to_vec()).unwrap();
        let locked = other_hour.lock();
        let misfiled = AFile::new("train_", hour(1), locked.hash(), CompressionFormat::Gzip);
        store
            .store(&misfiled, &locked.serialize(CompressionSpec::default()).unwrap())
            .unwrap();
        let mut before = store.list_in_hour(hour(1)).unwrap();
        before.sort();

        match merge_hour(&ctx(), &store, hour(1)) {
            Err(MergeError::CopyFailed { afile, dfile: copied, .. }) => {
                assert_eq!(afile, misfiled);
                assert_eq!(copied, dfile(2, 0, b"z"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let mut after = store.list_in_hour(hour(1)).unwrap();
        after.sort();
        assert_eq!(after, before);
    }

    #[test]
    fn corrupt_source_is_skipped_and_kept() {
        let store = PersistedAStore::in_memory();
        put_archive(&store, 1, &[(0, b"a")]);
        put_archive(&store, 1, &[(1, b"b")]);
        let corrupt = put_garbage(&store, 1, b"junk");

        let merged = merge_hour(&ctx(), &store, hour(1)).unwrap();
        let mut remaining = store.list_in_hour(hour(1)).unwrap();
        remaining.sort();
        let mut expected = vec![merged.clone(), corrupt];
        expected.sort();
        assert_eq!(remaining, expected);
        assert_eq!(members(&store, &merged).len(), 2);
    }

    #[test]
    fn all_sources_unreadable() {
        let store = PersistedAStore::in_memory();
        put_garbage(&store, 1, b"x");
        put_garbage(&store, 1, b"y");
        match merge_hour(&ctx(), &store, hour(1)) {
            Err(MergeError::NoReadableSources { hour: h, source }) => {
                assert_eq!(h, hour(1));
                assert_eq!(source.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.list_in_hour(hour(1)).unwrap().len(), 2);
    }

    // ---------------------------------------------------------------
    // merge_all
    // ---------------------------------------------------------------

    #[test]
    fn merge_all_covers_every_hour() {
        let store = Arc::new(PersistedAStore::in_memory());
        for h in [1, 2, 3] {
            put_archive(store.as_ref(), h, &[(0, b"a")]);
            put_archive(store.as_ref(), h, &[(5, b"b")]);
        }
        put_archive(store.as_ref(), 4, &[(0, b"only")]);

        let pool = WorkerPool::new(2);
        let merged = merge_all(&ctx(), store.clone(), &pool).into_result().unwrap();
        assert_eq!(
            merged.iter().map(|afile| afile.hour).collect::<Vec<_>>(),
            vec![hour(1), hour(2), hour(3), hour(4)]
        );
        for h in [1, 2, 3, 4] {
            assert_eq!(store.list_in_hour(hour(h)).unwrap().len(), 1);
        }
    }

    #[test]
    fn merge_all_reports_failures_alongside_successes() {
        let store = Arc::new(PersistedAStore::in_memory());
        put_archive(store.as_ref(), 1, &[(0, b"a")]);
        put_archive(store.as_ref(), 1, &[(1, b"b")]);
        put_garbage(store.as_ref(), 2, b"x");
        put_garbage(store.as_ref(), 2, b"y");

        let pool = WorkerPool::new(2);
        let report = merge_all(&ctx(), store, &pool);
        assert_eq!(report.merged.len(), 1);
        assert!(matches!(report.failure, Some(MergeError::NoReadableSources { .. })));
    }
}
