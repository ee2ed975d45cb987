use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_archive::{read, unpack};
use hoard_store::{
    copy_afile, AStore, DiskStorage, PersistedAStore, PersistedDStore, ReadableDStore,
};
use hoard_types::{AFile, Hour};

use crate::error::{check, TaskError, TaskResult};
use crate::session::Session;

/// Where and how retrieved data is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveOptions {
    pub path: PathBuf,
    pub start: Option<Hour>,
    pub end: Hour,
    /// Copy archives as they are instead of unpacking them.
    pub keep_packed: bool,
    /// Write every feed into `path` itself rather than `path/{feed}`.
    pub flatten_feeds: bool,
    /// Write files directly into the feed directory, without
    /// `YYYY/MM/DD/HH` subdirectories.
    pub flatten_hours: bool,
}

impl RetrieveOptions {
    pub fn new(path: impl Into<PathBuf>, start: Option<Hour>, end: Hour) -> Self {
        Self {
            path: path.into(),
            start,
            end,
            keep_packed: false,
            flatten_feeds: false,
            flatten_hours: false,
        }
    }

    fn feed_dir(&self, feed_id: &str) -> PathBuf {
        if self.flatten_feeds {
            self.path.clone()
        } else {
            self.path.join(feed_id)
        }
    }
}

/// What a retrieval wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetrieveSummary {
    pub archives: usize,
    pub downloads: usize,
}

/// Copy the feed's remote data for `[start, end]` to local disk.
///
/// Every archive is attempted; failures are returned together at the end.
pub fn retrieve(session: &Session, options: &RetrieveOptions) -> TaskResult<RetrieveSummary> {
    let remote = session.remote()?;
    let dir = options.feed_dir(session.id());
    let storage = Arc::new(DiskStorage::new(&dir));
    let archives = PersistedAStore::new(storage.clone());
    let downloads = PersistedDStore::new(storage);

    let afiles: Vec<AFile> = remote
        .search(options.start, options.end)?
        .into_iter()
        .flat_map(|result| result.afiles)
        .collect();
    tracing::info!(feed = %session.id(), archives = afiles.len(), dir = %dir.display(), "retrieving");

    let mut summary = RetrieveSummary::default();
    let mut errors = Vec::new();
    for afile in &afiles {
        let written = match (options.keep_packed, options.flatten_hours) {
            (true, false) => copy_afile(afile, remote, &archives).map(|()| 0).map_err(TaskError::from),
            (true, true) => write_flat_archive(afile, remote, &dir).map(|()| 0),
            (false, false) => unpack(afile, remote, &downloads).map_err(TaskError::from),
            (false, true) => write_flat_downloads(afile, remote, &dir),
        };
        match written {
            Ok(count) => {
                summary.archives += 1;
                summary.downloads += count;
                tracing::debug!(feed = %session.id(), afile = %afile, "retrieved archive");
            }
            Err(err) => {
                tracing::error!(feed = %session.id(), afile = %afile, error = %err, "failed to retrieve archive");
                errors.push(err);
            }
        }
    }
    tracing::info!(
        feed = %session.id(),
        archives = summary.archives,
        downloads = summary.downloads,
        "retrieve finished"
    );
    check(errors)?;
    Ok(summary)
}

fn write_flat_archive(afile: &AFile, source: &dyn AStore, dir: &Path) -> TaskResult<()> {
    let content = source.get(afile)?;
    fs::create_dir_all(dir)?;
    fs::write(dir.join(afile.name()), content)?;
    Ok(())
}

fn write_flat_downloads(afile: &AFile, source: &dyn AStore, dir: &Path) -> TaskResult<usize> {
    let archive = read(afile, source)?;
    fs::create_dir_all(dir)?;
    for dfile in archive.dfiles() {
        fs::write(dir.join(dfile.name()), archive.get(dfile)?)?;
    }
    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hoard_archive::create_from_dfiles;
    use hoard_store::DStore;
    use hoard_types::{DFile, Hash};

    use super::*;
    use crate::config::FeedConfig;

    fn hour(h: u32) -> Hour {
        Hour::new(2024, 8, 9, h).unwrap()
    }

    fn seeded_session() -> Session {
        let session = Session::in_memory(&FeedConfig::new("rail", "http://localhost/rail"), 1);
        for h in [1, 2, 3] {
            let dstore = PersistedDStore::in_memory();
            let mut dfiles = Vec::new();
            for minute in [0, 30] {
                let content = format!("{h}:{minute}");
                let time = Utc.with_ymd_and_hms(2024, 8, 9, h, minute, 0).unwrap();
                let dfile = DFile::new("rail_", ".txt", time, Hash::of(content.as_bytes()));
                dstore.store(&dfile, content.as_bytes()).unwrap();
                dfiles.push(dfile);
            }
            let remote = session.remote().unwrap();
            create_from_dfiles(session.archive_context(), hour(h), &dfiles, &dstore, remote).unwrap();
        }
        session
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn unpacks_downloads_in_range() {
        let session = seeded_session();
        let dir = tempfile::tempdir().unwrap();

        let options = RetrieveOptions::new(dir.path(), Some(hour(2)), hour(3));
        let summary = retrieve(&session, &options).unwrap();
        assert_eq!(summary, RetrieveSummary { archives: 2, downloads: 4 });

        let restored = PersistedDStore::new(Arc::new(DiskStorage::new(dir.path().join("rail"))));
        assert_eq!(restored.list_non_empty_hours().unwrap(), vec![hour(2), hour(3)]);
        let dfile = &restored.list_in_hour(hour(2)).unwrap()[1];
        assert_eq!(restored.get(dfile).unwrap(), b"2:30");
    }

    #[test]
    fn keeps_archives_packed() {
        let session = seeded_session();
        let dir = tempfile::tempdir().unwrap();

        let options = RetrieveOptions {
            keep_packed: true,
            ..RetrieveOptions::new(dir.path(), None, hour(23))
        };
        let summary = retrieve(&session, &options).unwrap();
        assert_eq!(summary, RetrieveSummary { archives: 3, downloads: 0 });

        let copied = PersistedAStore::new(Arc::new(DiskStorage::new(dir.path().join("rail"))));
        assert_eq!(
            copied.list_all().unwrap(),
            session.remote().unwrap().list_all().unwrap()
        );
    }

    #[test]
    fn flattened_layout_has_no_subdirectories() {
        let session = seeded_session();
        let dir = tempfile::tempdir().unwrap();

        let options = RetrieveOptions {
            flatten_feeds: true,
            flatten_hours: true,
            ..RetrieveOptions::new(dir.path(), Some(hour(1)), hour(1))
        };
        assert_eq!(retrieve(&session, &options).unwrap().downloads, 2);
        let names = file_names(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| name.starts_with("rail_20240809T01") && name.ends_with(".txt")));

        let packed = tempfile::tempdir().unwrap();
        let options = RetrieveOptions {
            keep_packed: true,
            flatten_hours: true,
            ..RetrieveOptions::new(packed.path(), None, hour(23))
        };
        retrieve(&session, &options).unwrap();
        let expected: Vec<String> = session
            .remote()
            .unwrap()
            .list_all()
            .unwrap()
            .iter()
            .map(AFile::name)
            .collect();
        assert_eq!(file_names(&packed.path().join("rail")), expected);
    }

    #[test]
    fn requires_remote_storage() {
        let session = Session::in_memory(&FeedConfig::new("rail", "http://localhost/rail"), 0);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            retrieve(&session, &RetrieveOptions::new(dir.path(), None, hour(0))),
            Err(TaskError::NoRemoteStorage)
        ));
    }
}
