use hoard_audit::{AuditPolicy, Auditor};
use hoard_types::Hour;

use crate::error::TaskResult;
use crate::metrics::TaskKind;
use crate::session::Session;

/// Options for one audit run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditOptions {
    /// `None` audits from the beginning of time.
    pub start: Option<Hour>,
    pub end: Hour,
    pub fix: bool,
    pub enforce_compression: bool,
}

impl AuditOptions {
    /// Audit from `hours` before `end` up to `end`, fixing problems.
    pub fn recent(end: Hour, hours: i64) -> Self {
        Self {
            start: Some(end.add(-hours)),
            end,
            fix: true,
            enforce_compression: false,
        }
    }
}

/// Audit the remote replicas of the session's feed.
///
/// Unmerged hours are only reported when merging is enabled for the
/// session. Returns the number of problems fixed.
pub fn audit_once(session: &Session, options: AuditOptions) -> TaskResult<usize> {
    let result = audit(session, options);
    session
        .metrics()
        .record_task(session.id(), TaskKind::Audit, result.is_ok());
    result
}

fn audit(session: &Session, options: AuditOptions) -> TaskResult<usize> {
    let remote = session.remote()?;
    let policy = AuditPolicy {
        enforce_merging: session.merging_enabled(),
        enforce_compression: options.enforce_compression,
    };
    let auditor = Auditor::new(session.archive_context(), remote, policy);
    tracing::debug!(
        feed = %session.id(),
        start = ?options.start,
        end = %options.end,
        fix = options.fix,
        "auditing"
    );
    Ok(auditor.run(options.start, options.end, options.fix)?)
}
