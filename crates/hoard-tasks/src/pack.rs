use hoard_archive::create_from_dfiles;
use hoard_store::{DStore, ReadableDStore};
use hoard_types::{AFile, Hour};

use crate::error::{check, TaskError, TaskResult};
use crate::metrics::TaskKind;
use crate::session::Session;

/// Pack every hour of local downloads into local archives.
///
/// With `skip_hour` set, downloads in that hour are left alone, typically
/// because it is still being written to. Each packed DFile is deleted from
/// the download store once its archive is stored.
pub fn pack_once(session: &Session, skip_hour: Option<Hour>) -> TaskResult<Vec<AFile>> {
    let result = pack_hours(session, skip_hour);
    session
        .metrics()
        .record_task(session.id(), TaskKind::Pack, result.is_ok());
    result
}

fn pack_hours(session: &Session, skip_hour: Option<Hour>) -> TaskResult<Vec<AFile>> {
    let dstore = session.local_dstore();
    let mut packed = Vec::new();
    let mut errors = Vec::new();
    for hour in dstore.list_non_empty_hours()? {
        if Some(hour) == skip_hour {
            tracing::debug!(feed = %session.id(), hour = %hour, "skipping current hour");
            continue;
        }
        match pack_hour(session, hour) {
            Ok(afile) => packed.push(afile),
            Err(err) => {
                tracing::error!(feed = %session.id(), hour = %hour, error = %err, "failed to pack hour");
                errors.push(err);
            }
        }
    }
    check(errors)?;
    Ok(packed)
}

fn pack_hour(session: &Session, hour: Hour) -> TaskResult<AFile> {
    let dstore = session.local_dstore();
    let dfiles = dstore.list_in_hour(hour)?;
    let (afile, incorporated) = create_from_dfiles(
        session.archive_context(),
        hour,
        &dfiles,
        dstore,
        session.local_astore().as_ref(),
    )?;
    tracing::info!(
        feed = %session.id(),
        hour = %hour,
        afile = %afile,
        downloads = incorporated.len(),
        "packed hour"
    );
    let errors: Vec<TaskError> = incorporated
        .iter()
        .filter_map(|dfile| dstore.delete(dfile).err())
        .map(TaskError::from)
        .collect();
    if !errors.is_empty() {
        tracing::warn!(
            feed = %session.id(),
            hour = %hour,
            failed = errors.len(),
            "failed to delete packed downloads"
        );
    }
    check(errors)?;
    Ok(afile)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use hoard_archive::read;
    use hoard_store::AStore;
    use hoard_types::DFile;

    use super::*;
    use crate::config::FeedConfig;
    use crate::download::testing::ScriptedSource;
    use crate::download::Downloader;

    fn session() -> Session {
        Session::in_memory(&FeedConfig::new("metro", "http://localhost/metro"), 0)
    }

    fn store_download(session: &Session, h: u32, second: i64, content: &[u8]) -> DFile {
        let time = Utc.with_ymd_and_hms(2024, 9, 1, h, 0, 0).unwrap() + Duration::seconds(second);
        let dfile = DFile::new("metro_", "", time, hoard_types::Hash::of(content));
        session.local_dstore().store(&dfile, content).unwrap();
        dfile
    }

    #[test]
    fn packs_each_hour_and_clears_downloads() {
        let session = session();
        store_download(&session, 1, 0, b"a");
        store_download(&session, 1, 30, b"b");
        store_download(&session, 2, 0, b"c");

        let afiles = pack_once(&session, None).unwrap();
        assert_eq!(afiles.len(), 2);
        assert!(session.local_dstore().list_non_empty_hours().unwrap().is_empty());
        let first = read(&afiles[0], session.local_astore().as_ref()).unwrap();
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn skipped_hour_is_left_alone() {
        let session = session();
        store_download(&session, 1, 0, b"a");
        let current = store_download(&session, 2, 0, b"b");

        let afiles = pack_once(&session, Some(current.hour())).unwrap();
        assert_eq!(afiles.len(), 1);
        assert_eq!(
            session.local_dstore().list_non_empty_hours().unwrap(),
            vec![current.hour()]
        );
    }

    #[test]
    fn nothing_to_pack() {
        assert!(pack_once(&session(), None).unwrap().is_empty());
    }

    #[test]
    fn twelve_payloads_over_three_cycles_merge_into_one_archive() {
        let session = session();
        let cycles: [&[&str]; 3] = [
            &["p0", "p1", "p1", "p2"],
            &["p3", "p3", "p4", "p5"],
            &["p5", "p6", "p7", "p7"],
        ];
        let base = Utc.with_ymd_and_hms(2024, 9, 1, 4, 0, 0).unwrap();
        let mut second = 0;
        let mut stored = Vec::new();
        for (cycle, payloads) in cycles.iter().enumerate() {
            let source = ScriptedSource::new(payloads.iter().copied());
            let mut downloader = Downloader::new(&session, &source);
            for _ in 0..payloads.len() {
                if let Some(dfile) = downloader.download_at(base + Duration::seconds(second)).unwrap() {
                    stored.push(dfile);
                }
                second += 5;
            }
            // First pack after two cycles, second pack after the third.
            if cycle == 1 {
                pack_once(&session, None).unwrap();
            }
        }
        pack_once(&session, None).unwrap();

        let astore = session.local_astore();
        let hour = Hour::containing(base);
        assert_eq!(astore.list_in_hour(hour).unwrap().len(), 2);

        let merged = hoard_merge::merge_hour(session.archive_context(), astore.as_ref(), hour).unwrap();
        assert_eq!(astore.list_in_hour(hour).unwrap(), vec![merged.clone()]);
        let archive = read(&merged, astore.as_ref()).unwrap();
        let members: Vec<DFile> = archive.dfiles().cloned().collect();
        stored.sort();
        assert_eq!(members, stored);
        // Consecutive repeats are never stored; "p5" ends cycle two and
        // starts cycle three with a fresh downloader, so it is stored twice.
        assert_eq!(members.len(), 9);
    }
}
