//! Caller-facing ingest front end.

use std::sync::Arc;
use std::time::Duration;

use ballast_store::{DocumentIdentity, StoreError, WriteRequest};
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    accounting::DispatchAccounting,
    ack::AcknowledgeInfo,
    error::{ChannelClosedSnafu, DisabledSnafu, Result},
    listener::CompletionListener,
    processor::Command,
    tracker::JobTracker,
};

/// Cloneable handle submitting writes to the bulk processor.
///
/// Writes tagged with correlation ids are tracked until a later
/// [`acknowledge`](Self::acknowledge) call drains them into a report;
/// untagged writes are fire-and-forget. Once the circuit breaker is open
/// every submission is rejected until [`enable`](Self::enable) is called.
#[derive(Clone)]
pub struct IngestClient {
    tx: mpsc::Sender<Command>,
    tracker: Arc<JobTracker>,
    accounting: Arc<DispatchAccounting>,
    listener: CompletionListener,
}

impl IngestClient {
    pub(crate) fn new(
        tx: mpsc::Sender<Command>,
        tracker: Arc<JobTracker>,
        accounting: Arc<DispatchAccounting>,
        listener: CompletionListener,
    ) -> Self {
        Self {
            tx,
            tracker,
            accounting,
            listener,
        }
    }

    /// Queue an index (upsert) of `source` at `identity`.
    pub async fn bulk_index(
        &self,
        identity: DocumentIdentity,
        source: Bytes,
        correlation_ids: &[u64],
    ) -> Result<()> {
        self.submit(WriteRequest::index(identity, source), correlation_ids)
            .await
    }

    /// Queue an update of `identity` with `source`.
    pub async fn bulk_update(
        &self,
        identity: DocumentIdentity,
        source: Bytes,
        correlation_ids: &[u64],
    ) -> Result<()> {
        self.submit(WriteRequest::update(identity, source), correlation_ids)
            .await
    }

    /// Queue a delete of `identity`.
    pub async fn bulk_delete(
        &self,
        identity: DocumentIdentity,
        correlation_ids: &[u64],
    ) -> Result<()> {
        self.submit(WriteRequest::delete(identity), correlation_ids)
            .await
    }

    async fn submit(&self, request: WriteRequest, correlation_ids: &[u64]) -> Result<()> {
        if !self.accounting.is_enabled() {
            return DisabledSnafu.fail();
        }

        // Track before handing the write to the channel: a batch cannot
        // resolve an identity before its write reached the processor, but
        // the reverse race would lose resolutions.
        let identity = request.identity.clone();
        self.tracker.track(&identity, correlation_ids);

        if self.tx.send(Command::Write(request)).await.is_err() {
            self.tracker.resolve(&identity, false);
            return ChannelClosedSnafu.fail();
        }

        Ok(())
    }

    /// Drain every tracked job into an immutable report and reset the
    /// registry for the next cycle.
    ///
    /// Jobs whose batch has not resolved yet are drained as unresolved;
    /// callers that want every submission reflected should flush and
    /// [`wait_for_responses`](Self::wait_for_responses) first.
    pub fn acknowledge(&self) -> AcknowledgeInfo {
        self.tracker.finish()
    }

    /// Force the processor to dispatch whatever it has buffered.
    pub async fn flush(&self) -> Result<()> {
        self.tx
            .send(Command::Flush)
            .await
            .map_err(|_| ChannelClosedSnafu.build())
    }

    /// Block until no bulk requests are outstanding or `max_wait` elapses.
    /// Returns whether everything in flight resolved.
    pub async fn wait_for_responses(&self, max_wait: Duration) -> bool {
        self.accounting.wait_idle(max_wait).await
    }

    pub fn is_enabled(&self) -> bool {
        self.accounting.is_enabled()
    }

    /// Re-arm the circuit breaker after a terminal failure. This is an
    /// explicit operator action; the core never re-enables itself.
    pub fn enable(&self) {
        self.accounting.enable();
    }

    pub fn has_failure(&self) -> bool {
        self.listener.has_failure()
    }

    /// The most recent terminal batch failure, if any.
    pub fn last_failure(&self) -> Option<StoreError> {
        self.listener.last_failure()
    }

    /// Bulk requests handed to the store and not yet completed.
    pub fn outstanding_requests(&self) -> u64 {
        self.accounting.outstanding()
    }

    /// Cumulative submitted volume in bytes.
    pub fn volume_in_bytes(&self) -> u64 {
        self.accounting.volume_bytes()
    }
}
