use std::sync::Arc;

use hoard_merge::{merge_all, merge_hour};
use hoard_store::{copy_afile, AStore};
use hoard_types::AFile;

use crate::error::{check, TaskResult};
use crate::metrics::TaskKind;
use crate::session::Session;

/// Move every local archive to remote storage.
///
/// With merging enabled, local hours are merged first and each uploaded
/// hour is merged again on the remote side. A local archive is deleted only
/// after it is stored on every replica, so a failed copy is retried on the
/// next run.
pub fn upload_once(session: &Session) -> TaskResult<Vec<AFile>> {
    let result = upload_all(session);
    session
        .metrics()
        .record_task(session.id(), TaskKind::Upload, result.is_ok());
    result
}

fn upload_all(session: &Session) -> TaskResult<Vec<AFile>> {
    let remote = session.remote()?;
    let local = session.local_astore();
    if session.merging_enabled() {
        let report = merge_all(session.archive_context(), Arc::clone(local), session.pool());
        if let Some(err) = report.failure {
            // Unmerged hours are still uploaded; the remote merge catches up.
            tracing::warn!(feed = %session.id(), error = %err, "local merge incomplete");
        }
    }

    let mut uploaded = Vec::new();
    let mut errors = Vec::new();
    for afile in local.list_all()? {
        match upload_afile(session, remote, &afile) {
            Ok(()) => uploaded.push(afile),
            Err(err) => {
                tracing::error!(feed = %session.id(), afile = %afile, error = %err, "failed to upload archive");
                errors.push(err);
            }
        }
    }
    tracing::info!(feed = %session.id(), uploaded = uploaded.len(), failed = errors.len(), "upload finished");
    check(errors)?;
    Ok(uploaded)
}

/// Once the copy succeeds, deleting the local copy and merging the remote
/// hour are both attempted regardless of each other.
fn upload_afile(session: &Session, remote: &dyn AStore, afile: &AFile) -> TaskResult<()> {
    let local = session.local_astore();
    copy_afile(afile, local.as_ref(), remote)?;
    tracing::debug!(feed = %session.id(), afile = %afile, "uploaded archive");
    let mut errors = Vec::new();
    if let Err(err) = local.delete(afile) {
        errors.push(err.into());
    }
    if session.merging_enabled() {
        if let Err(err) = merge_hour(session.archive_context(), remote, afile.hour) {
            errors.push(err.into());
        }
    }
    check(errors)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hoard_archive::{create_from_dfiles, read};
    use hoard_store::{DStore, PersistedDStore};
    use hoard_types::{DFile, Hash, Hour};

    use super::*;
    use crate::config::FeedConfig;
    use crate::error::TaskError;
    use crate::metrics::CountingMetrics;

    fn feed() -> FeedConfig {
        FeedConfig::new("ferry", "http://localhost/ferry")
    }

    /// Pack `payloads` into one archive for `h` in `target`.
    fn archive(session: &Session, target: &dyn AStore, h: u32, payloads: &[&str]) -> AFile {
        let dstore = PersistedDStore::in_memory();
        let mut dfiles = Vec::new();
        for (i, payload) in payloads.iter().enumerate() {
            let time = Utc.with_ymd_and_hms(2024, 6, 1, h, i as u32, 0).unwrap();
            let dfile = DFile::new("ferry_", "", time, Hash::of(payload.as_bytes()));
            dstore.store(&dfile, payload.as_bytes()).unwrap();
            dfiles.push(dfile);
        }
        let hour = Hour::new(2024, 6, 1, h).unwrap();
        create_from_dfiles(session.archive_context(), hour, &dfiles, &dstore, target)
            .unwrap()
            .0
    }

    #[test]
    fn requires_remote_storage() {
        let session = Session::in_memory(&feed(), 0);
        assert!(matches!(upload_once(&session), Err(TaskError::NoRemoteStorage)));
    }

    #[test]
    fn uploads_to_every_replica_and_clears_local() {
        let session = Session::in_memory(&feed(), 2);
        archive(&session, session.local_astore().as_ref(), 1, &["a", "b"]);
        archive(&session, session.local_astore().as_ref(), 1, &["c"]);
        archive(&session, session.local_astore().as_ref(), 2, &["d"]);

        let uploaded = upload_once(&session).unwrap();
        // The two hour-1 archives were merged locally before upload.
        assert_eq!(uploaded.len(), 2);
        assert!(session.local_astore().list_all().unwrap().is_empty());
        for replica in session.remote().unwrap().replicas() {
            assert_eq!(replica.list_all().unwrap(), uploaded);
        }
        let merged = read(&uploaded[0], session.remote().unwrap()).unwrap();
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merges_with_existing_remote_archive() {
        let session = Session::in_memory(&feed(), 2);
        let remote = session.remote().unwrap();
        archive(&session, remote, 3, &["old"]);
        archive(&session, session.local_astore().as_ref(), 3, &["new"]);

        upload_once(&session).unwrap();
        let hour = Hour::new(2024, 6, 1, 3).unwrap();
        let afiles = remote.list_in_hour(hour).unwrap();
        assert_eq!(afiles.len(), 1);
        assert_eq!(read(&afiles[0], remote).unwrap().len(), 2);
    }

    #[test]
    fn without_merging_archives_are_uploaded_as_is() {
        let metrics = Arc::new(CountingMetrics::new());
        let session = Session::in_memory(&feed(), 1)
            .with_merging(false)
            .with_metrics(metrics.clone());
        archive(&session, session.local_astore().as_ref(), 4, &["a"]);
        archive(&session, session.local_astore().as_ref(), 4, &["b"]);

        assert_eq!(upload_once(&session).unwrap().len(), 2);
        let hour = Hour::new(2024, 6, 1, 4).unwrap();
        assert_eq!(session.remote().unwrap().list_in_hour(hour).unwrap().len(), 2);
        assert_eq!(metrics.runs("ferry", TaskKind::Upload, true), 1);
    }
}
