use std::collections::BTreeSet;

use hoard_archive::{recompress, ArchiveContext};
use hoard_merge::merge_hour;
use hoard_store::{copy_afile, AStore, ReplicatedAStore};
use hoard_types::{Hour, MultiError};

use crate::error::{AuditError, AuditResult};
use crate::problem::Problem;

/// Which problem classes the audit reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditPolicy {
    pub enforce_merging: bool,
    pub enforce_compression: bool,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            enforce_merging: true,
            enforce_compression: false,
        }
    }
}

/// Detects and repairs divergence in one feed's replicated store.
///
/// The union of all replicas is the ground truth: an hour present in any
/// replica should be present, merged, in every replica.
pub struct Auditor<'a> {
    ctx: &'a ArchiveContext,
    store: &'a ReplicatedAStore,
    policy: AuditPolicy,
}

impl<'a> Auditor<'a> {
    pub fn new(ctx: &'a ArchiveContext, store: &'a ReplicatedAStore, policy: AuditPolicy) -> Self {
        Self { ctx, store, policy }
    }

    /// Every problem in `[start, end]`. Nothing is modified.
    pub fn find_problems(&self, start: Option<Hour>, end: Hour) -> AuditResult<Vec<Problem>> {
        let aggregate = self.store.search(start, end)?;
        let mut problems = Vec::new();

        let unmerged: BTreeSet<Hour> = aggregate
            .iter()
            .filter(|result| result.afiles.len() > 1)
            .map(|result| result.hour)
            .collect();
        if self.policy.enforce_merging {
            problems.extend(unmerged.iter().map(|&hour| Problem::UnmergedHour { hour }));
        }

        for (replica, store) in self.store.replicas().iter().enumerate() {
            let present: BTreeSet<Hour> = store
                .search(start, end)?
                .into_iter()
                .map(|result| result.hour)
                .collect();
            problems.extend(
                aggregate
                    .iter()
                    .map(|result| result.hour)
                    .filter(|hour| !unmerged.contains(hour) && !present.contains(hour))
                    .map(|hour| Problem::NonReplicatedData { hour, replica }),
            );
        }

        if self.policy.enforce_compression {
            let format = self.ctx.compression.format();
            for result in &aggregate {
                let mut afiles = result.afiles.iter();
                if let (Some(afile), None) = (afiles.next(), afiles.next()) {
                    if afile.compression != format {
                        problems.push(Problem::IncorrectCompression {
                            hour: result.hour,
                            afile: afile.clone(),
                        });
                    }
                }
            }
        }
        Ok(problems)
    }

    /// Repair one problem.
    pub fn fix(&self, problem: &Problem) -> AuditResult<()> {
        match problem {
            Problem::UnmergedHour { hour } => {
                merge_hour(self.ctx, self.store, *hour)?;
            }
            Problem::NonReplicatedData { hour, replica } => {
                let target = self
                    .store
                    .replicas()
                    .get(*replica)
                    .ok_or(AuditError::UnknownReplica(*replica))?;
                let errors: Vec<AuditError> = self
                    .store
                    .list_in_hour(*hour)?
                    .iter()
                    .filter_map(|afile| copy_afile(afile, self.store, target.as_ref()).err())
                    .map(AuditError::from)
                    .collect();
                MultiError::check(errors).map_err(AuditError::Multiple)?;
            }
            Problem::IncorrectCompression { afile, .. } => {
                let recompressed = recompress(self.ctx, afile, self.store, self.store)?;
                if recompressed != *afile {
                    self.store.delete(afile)?;
                }
            }
        }
        Ok(())
    }

    /// Audit `[start, end]`.
    ///
    /// Without `fix`, any problem found is returned as
    /// [`AuditError::ProblemsFound`]. With `fix`, every problem is repaired
    /// independently and the failures are returned together. Returns the
    /// number of problems fixed.
    pub fn run(&self, start: Option<Hour>, end: Hour, fix: bool) -> AuditResult<usize> {
        let problems = self.find_problems(start, end)?;
        if problems.is_empty() {
            tracing::info!(store = %self.store, "audit found no problems");
            return Ok(0);
        }
        for problem in &problems {
            tracing::info!(hour = %problem.hour(), problem = %problem, "audit problem");
        }
        if !fix {
            return Err(AuditError::ProblemsFound { problems });
        }

        let total = problems.len();
        let mut errors = Vec::new();
        for (index, problem) in problems.into_iter().enumerate() {
            match self.fix(&problem) {
                Ok(()) => tracing::debug!(problem = %problem, "fixed {}/{}", index + 1, total),
                Err(err) => {
                    tracing::error!(problem = %problem, error = %err, "failed to fix audit problem");
                    errors.push(AuditError::FixFailed {
                        problem,
                        source: Box::new(err),
                    });
                }
            }
        }
        let fixed = total - errors.len();
        tracing::info!(fixed, total, "audit finished");
        MultiError::check(errors).map_err(AuditError::Multiple)?;
        Ok(fixed)
    }
}
