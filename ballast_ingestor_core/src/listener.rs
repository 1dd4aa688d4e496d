//! Translation of batch-level completion events into registry updates.

use std::sync::{Arc, Mutex};

use ballast_store::{ItemOutcome, StoreError, WriteRequest};
use tracing::{debug, error};

use crate::{accounting::DispatchAccounting, tracker::JobTracker};

/// Applies per-batch completion events to the shared tracker and accounting.
///
/// Invoked from the dispatch loop as in-flight bulk requests finish, in
/// whatever order they complete.
#[derive(Debug, Clone)]
pub struct CompletionListener {
    tracker: Arc<JobTracker>,
    accounting: Arc<DispatchAccounting>,
    last_failure: Arc<Mutex<Option<StoreError>>>,
}

impl CompletionListener {
    pub fn new(tracker: Arc<JobTracker>, accounting: Arc<DispatchAccounting>) -> Self {
        Self {
            tracker,
            accounting,
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// The batch completed and the store reported one outcome per item.
    ///
    /// Item-level rejections resolve only their own identity's group and do
    /// not trip the breaker.
    pub fn batch_completed(&self, outcomes: &[ItemOutcome]) {
        for outcome in outcomes {
            if !outcome.succeeded {
                debug!(
                    identity = %outcome.identity,
                    operation = %outcome.operation,
                    reason = outcome.reason.as_deref().unwrap_or("unknown"),
                    "bulk item rejected"
                );
            }
            self.tracker.resolve(&outcome.identity, outcome.succeeded);
        }
        self.accounting.after_dispatch(true);
    }

    /// The batch failed wholesale with no per-item detail.
    ///
    /// Every identity the batch carried resolves as failed, the failure is
    /// retained for caller inspection, and the breaker trips.
    pub fn batch_failed(&self, ops: &[WriteRequest], failure: StoreError) {
        error!(actions = ops.len(), %failure, "bulk request failed, disabling submission");
        for op in ops {
            self.tracker.resolve(&op.identity, false);
        }
        *self.last_failure.lock().expect("last failure lock poisoned") = Some(failure);
        self.accounting.after_dispatch(false);
    }

    pub fn has_failure(&self) -> bool {
        self.last_failure
            .lock()
            .expect("last failure lock poisoned")
            .is_some()
    }

    /// The most recent terminal batch failure, if any.
    pub fn last_failure(&self) -> Option<StoreError> {
        self.last_failure
            .lock()
            .expect("last failure lock poisoned")
            .clone()
    }
}
