//! Pending-job registry correlating submitted writes with batch outcomes.

use std::collections::HashMap;
use std::sync::Mutex;

use ballast_store::DocumentIdentity;
use tracing::trace;

use crate::ack::{AcknowledgeInfo, AcknowledgeItem, Job};

/// Jobs awaiting resolution for one document identity, with the outcome
/// folded over every resolution seen this cycle.
#[derive(Debug, Default)]
struct AckGroup {
    jobs: Vec<Job>,
    /// `None` until the first resolution arrives. A false outcome is sticky
    /// for the rest of the cycle.
    outcome: Option<bool>,
}

impl AckGroup {
    fn resolve(&mut self, succeeded: bool) {
        self.outcome = Some(match self.outcome {
            Some(false) => false,
            _ => succeeded,
        });
    }
}

/// Registry of writes submitted with correlation ids, keyed by the document
/// identity the store reports outcomes against.
///
/// A single mutex guards the identity→group map: `track` and `resolve` are
/// short in-memory mutations safe to call from submitters and completion
/// handling alike, and `finish` swaps the whole map out in one critical
/// section so the drain is atomic with respect to both.
#[derive(Debug, Default)]
pub struct JobTracker {
    groups: Mutex<HashMap<DocumentIdentity, AckGroup>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one job per correlation id against `identity`, appended in
    /// submission order. A write submitted without ids is fire-and-forget
    /// and never appears in a report.
    pub fn track(&self, identity: &DocumentIdentity, correlation_ids: &[u64]) {
        if correlation_ids.is_empty() {
            return;
        }

        let mut groups = self.groups.lock().expect("job tracker lock poisoned");
        let group = groups.entry(identity.clone()).or_default();
        for &correlation_id in correlation_ids {
            let order = group.jobs.len() as u64;
            group.jobs.push(Job {
                correlation_id,
                order,
                succeeded: None,
            });
        }
    }

    /// Fold a reported outcome for `identity` into its group.
    ///
    /// Outcomes for identities nobody is tracking are expected (most writes
    /// carry no correlation id) and silently ignored.
    pub fn resolve(&self, identity: &DocumentIdentity, succeeded: bool) {
        let mut groups = self.groups.lock().expect("job tracker lock poisoned");
        if let Some(group) = groups.get_mut(identity) {
            trace!(%identity, succeeded, "resolving tracked identity");
            group.resolve(succeeded);
        }
    }

    /// Drain every tracked job into an immutable report and clear the
    /// registry for the next cycle.
    ///
    /// Each job carries its group's final outcome: a group that saw any
    /// failed resolution reports every job failed, even jobs resolved true
    /// earlier in the cycle, and a group that never resolved reports `None`.
    pub fn finish(&self) -> AcknowledgeInfo {
        let drained = {
            let mut groups = self.groups.lock().expect("job tracker lock poisoned");
            std::mem::take(&mut *groups)
        };

        let mut items = Vec::new();
        for (identity, group) in drained {
            let AckGroup { jobs, outcome } = group;
            for mut job in jobs {
                job.succeeded = outcome;
                items.push(AcknowledgeItem {
                    identity: identity.clone(),
                    job,
                });
            }
        }

        AcknowledgeInfo::new(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn identity(id: &str) -> DocumentIdentity {
        DocumentIdentity::new("logs", "event", id)
    }

    #[test]
    fn test_all_jobs_succeed_on_single_true_resolution() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[1, 2]);
        tracker.resolve(&identity("a"), true);

        let info = tracker.finish();
        assert!(info.processed());
        assert!(info.succeeded());
        assert_eq!(info.items().len(), 2);
        assert!(info.items().iter().all(|i| i.job.succeeded == Some(true)));
    }

    #[test]
    fn test_failure_is_sticky_across_later_true_resolutions() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[1, 2]);
        tracker.resolve(&identity("a"), false);
        tracker.track(&identity("a"), &[3]);
        tracker.resolve(&identity("a"), true);

        let info = tracker.finish();
        assert_eq!(info.items().len(), 3);
        assert!(info.items().iter().all(|i| i.job.succeeded == Some(false)));
        assert!(!info.succeeded());
        assert_eq!(info.min_correlation_id(), Some(1));
        assert_eq!(info.max_correlation_id(), Some(3));
    }

    #[test]
    fn test_jobs_keep_submission_order_within_group() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[10]);
        tracker.track(&identity("a"), &[20, 30]);
        tracker.resolve(&identity("a"), true);

        let info = tracker.finish();
        let mut jobs: Vec<_> = info.items().iter().map(|i| i.job.clone()).collect();
        jobs.sort_by_key(|job| job.order);
        assert_eq!(
            jobs.iter().map(|j| j.correlation_id).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        assert_eq!(jobs.iter().map(|j| j.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_untagged_submission_is_never_reported() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[]);
        tracker.resolve(&identity("a"), true);

        assert!(!tracker.finish().processed());
    }

    #[test]
    fn test_resolution_for_unknown_identity_is_ignored() {
        let tracker = JobTracker::new();
        tracker.resolve(&identity("nobody"), false);

        tracker.track(&identity("a"), &[1]);
        tracker.resolve(&identity("a"), true);
        assert!(tracker.finish().succeeded());
    }

    #[test]
    fn test_second_finish_reports_nothing() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[1]);
        tracker.resolve(&identity("a"), true);

        assert!(tracker.finish().processed());
        assert!(!tracker.finish().processed());
    }

    #[test]
    fn test_unresolved_group_drains_with_unresolved_jobs() {
        let tracker = JobTracker::new();
        tracker.track(&identity("a"), &[1]);

        let info = tracker.finish();
        assert!(info.processed());
        assert!(!info.succeeded());
        assert_eq!(info.items()[0].job.succeeded, None);
    }

    #[test]
    fn test_concurrent_track_and_resolve() {
        let tracker = Arc::new(JobTracker::new());
        let producers = 8;

        let mut handles = Vec::new();
        for n in 0..producers {
            let tracker = tracker.clone();
            handles.push(thread::spawn(move || {
                tracker.track(&identity(&format!("doc-{n}")), &[n as u64]);
            }));
        }
        for n in 0..4 {
            let tracker = tracker.clone();
            handles.push(thread::spawn(move || {
                tracker.resolve(&identity(&format!("other-{n}")), false);
            }));
        }
        for handle in handles {
            handle.join().expect("thread panicked");
        }

        let info = tracker.finish();
        assert_eq!(info.items().len(), producers);
        let mut ids: Vec<_> = info
            .items()
            .iter()
            .map(|i| i.job.correlation_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..producers as u64).collect::<Vec<_>>());
    }
}
