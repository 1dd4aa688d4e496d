//! Background bulk dispatch loop.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use ballast_store::{ItemOutcome, RemoteStore, StoreResult, WriteRequest};
use bytesize::ByteSize;
use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    accounting::DispatchAccounting, client::IngestClient, error::Result,
    listener::CompletionListener, tracker::JobTracker,
};

/// Thresholds for the dispatch loop, passed once at construction. A running
/// processor is never reconfigured.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Dispatch the buffer once it holds this many actions.
    pub max_actions: usize,
    /// Dispatch the buffer once it holds this many bytes.
    pub max_volume_bytes: u64,
    /// Cap on concurrently in-flight bulk requests.
    pub max_concurrent_requests: usize,
    /// Dispatch whatever is buffered at this interval.
    pub flush_interval: Duration,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            max_actions: 100,
            max_volume_bytes: 10 * 1024 * 1024,
            max_concurrent_requests: 30,
            flush_interval: Duration::from_secs(30),
        }
    }
}

pub(crate) enum Command {
    Write(WriteRequest),
    Flush,
}

type BulkCompletion = (Vec<WriteRequest>, StoreResult<Vec<ItemOutcome>>);
type InFlight = FuturesUnordered<BoxFuture<'static, BulkCompletion>>;

/// Batches writes and executes them against the store's bulk endpoint.
///
/// Writes arrive over a command channel from any number of [`IngestClient`]
/// clones and are buffered until a [`BulkOptions`] threshold is hit, the
/// flush interval elapses, or a client forces a flush. Completions are folded
/// back into the shared tracker and accounting by the completion listener,
/// in whatever order the in-flight requests finish.
pub struct BulkProcessor {
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    store: Arc<dyn RemoteStore>,
    tracker: Arc<JobTracker>,
    accounting: Arc<DispatchAccounting>,
    listener: CompletionListener,
    options: BulkOptions,
}

pub async fn run_background_processor(
    processor: BulkProcessor,
    ct: CancellationToken,
) -> Result<()> {
    processor.run(ct).await
}

impl BulkProcessor {
    pub fn new(store: Arc<dyn RemoteStore>, options: BulkOptions) -> Self {
        let (tx, rx) = mpsc::channel(100);
        let tracker = Arc::new(JobTracker::new());
        let accounting = Arc::new(DispatchAccounting::new());
        let listener = CompletionListener::new(tracker.clone(), accounting.clone());

        Self {
            tx,
            rx,
            store,
            tracker,
            accounting,
            listener,
            options,
        }
    }

    pub fn client(&self) -> IngestClient {
        IngestClient::new(
            self.tx.clone(),
            self.tracker.clone(),
            self.accounting.clone(),
            self.listener.clone(),
        )
    }

    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let BulkProcessor {
            tx,
            mut rx,
            store,
            tracker: _,
            accounting,
            listener,
            options,
        } = self;
        // Only clients hold senders now, so the loop also ends when the
        // last client goes away.
        drop(tx);

        let _ct_guard = ct.child_token().drop_guard();
        let mut buffer: Vec<WriteRequest> = Vec::new();
        let mut buffered_bytes: u64 = 0;
        let mut in_flight: InFlight = FuturesUnordered::new();
        let mut flush_timer = tokio::time::interval(options.flush_interval);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    break;
                }
                _ = flush_timer.tick() => {
                    if !buffer.is_empty() && in_flight.len() < options.max_concurrent_requests {
                        dispatch(&store, &accounting, &mut buffer, &mut buffered_bytes, &mut in_flight);
                    }
                }
                command = rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };

                    match command {
                        Command::Write(request) => {
                            buffered_bytes += request.estimated_size_in_bytes();
                            buffer.push(request);

                            let over_threshold = buffer.len() >= options.max_actions
                                || buffered_bytes >= options.max_volume_bytes;
                            if over_threshold && in_flight.len() < options.max_concurrent_requests {
                                dispatch(&store, &accounting, &mut buffer, &mut buffered_bytes, &mut in_flight);
                            }
                        }
                        // An explicit flush is the caller's direct order and
                        // ignores the concurrency cap.
                        Command::Flush => {
                            if !buffer.is_empty() {
                                dispatch(&store, &accounting, &mut buffer, &mut buffered_bytes, &mut in_flight);
                            }
                        }
                    }
                }
                completion = in_flight.next(), if !in_flight.is_empty() => {
                    let Some(completion) = completion else {
                        continue;
                    };

                    handle_completion(&listener, completion);

                    let over_threshold = buffer.len() >= options.max_actions
                        || buffered_bytes >= options.max_volume_bytes;
                    if over_threshold && in_flight.len() < options.max_concurrent_requests {
                        dispatch(&store, &accounting, &mut buffer, &mut buffered_bytes, &mut in_flight);
                    }
                }
            }
        }

        // Drain on the way out: whatever is buffered still goes to the
        // store, and in-flight requests get their completions applied.
        if !buffer.is_empty() {
            dispatch(&store, &accounting, &mut buffer, &mut buffered_bytes, &mut in_flight);
        }
        while let Some(completion) = in_flight.next().await {
            handle_completion(&listener, completion);
        }

        debug!("bulk processor stopped");

        Ok(())
    }
}

fn dispatch(
    store: &Arc<dyn RemoteStore>,
    accounting: &DispatchAccounting,
    buffer: &mut Vec<WriteRequest>,
    buffered_bytes: &mut u64,
    in_flight: &mut InFlight,
) {
    let ops = mem::take(buffer);
    let volume = mem::take(buffered_bytes);

    accounting.before_dispatch(volume);
    debug!(
        actions = ops.len(),
        volume = %ByteSize(volume),
        total_volume = %ByteSize(accounting.volume_bytes()),
        outstanding = accounting.outstanding(),
        "dispatching bulk request"
    );

    let store = store.clone();
    in_flight.push(
        async move {
            let result = store.bulk(&ops).await;
            (ops, result)
        }
        .boxed(),
    );
}

fn handle_completion(listener: &CompletionListener, (ops, result): BulkCompletion) {
    match result {
        Ok(outcomes) => {
            trace!(actions = ops.len(), "bulk request completed");
            listener.batch_completed(&outcomes);
        }
        Err(failure) => listener.batch_failed(&ops, failure),
    }
}
