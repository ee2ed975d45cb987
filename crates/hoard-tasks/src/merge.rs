use std::sync::Arc;

use hoard_merge::merge_all;
use hoard_types::AFile;

use crate::error::TaskResult;
use crate::metrics::TaskKind;
use crate::session::Session;

/// Merge every hour of the local archive store.
pub fn merge_once(session: &Session) -> TaskResult<Vec<AFile>> {
    let report = merge_all(
        session.archive_context(),
        Arc::clone(session.local_astore()),
        session.pool(),
    );
    session
        .metrics()
        .record_task(session.id(), TaskKind::Merge, report.failure.is_none());
    Ok(report.into_result()?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hoard_archive::create_from_dfiles;
    use hoard_store::{AStore, DStore, PersistedDStore};
    use hoard_types::{DFile, Hash, Hour};

    use super::*;
    use crate::config::FeedConfig;
    use crate::metrics::CountingMetrics;

    #[test]
    fn merges_local_hours() {
        let metrics = Arc::new(CountingMetrics::new());
        let session = Session::in_memory(&FeedConfig::new("bus", "http://localhost/bus"), 0)
            .with_metrics(metrics.clone());
        let hour = Hour::new(2024, 3, 4, 5).unwrap();
        for (minute, payload) in [(1, "a"), (2, "b"), (3, "c")] {
            let dstore = PersistedDStore::in_memory();
            let time = Utc.with_ymd_and_hms(2024, 3, 4, 5, minute, 0).unwrap();
            let dfile = DFile::new("bus_", "", time, Hash::of(payload.as_bytes()));
            dstore.store(&dfile, payload.as_bytes()).unwrap();
            create_from_dfiles(
                session.archive_context(),
                hour,
                &[dfile],
                &dstore,
                session.local_astore().as_ref(),
            )
            .unwrap();
        }

        let merged = merge_once(&session).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(session.local_astore().list_all().unwrap(), merged);
        assert_eq!(metrics.runs("bus", TaskKind::Merge, true), 1);
    }
}
