use std::sync::Arc;
use std::time::Duration;

use ballast_ingestor_core::{BulkOptions, BulkProcessor, IngestClient};
use ballast_store::{DocumentIdentity, InMemoryStore};
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[allow(dead_code)]
pub fn spawn_processor(
    options: BulkOptions,
) -> (
    JoinHandle<()>,
    IngestClient,
    Arc<InMemoryStore>,
    CancellationToken,
) {
    let store = Arc::new(InMemoryStore::new());
    let processor = BulkProcessor::new(store.clone(), options);
    let client = processor.client();
    let ct = CancellationToken::new();
    let task = tokio::spawn({
        let ct = ct.clone();
        async move {
            processor.run(ct).await.expect("processor run");
        }
    });

    (task, client, store, ct)
}

pub fn doc(id: &str) -> DocumentIdentity {
    DocumentIdentity::new("logs", "event", id)
}

pub fn body(value: serde_json::Value) -> Bytes {
    Bytes::from(value.to_string())
}

/// Polls until `condition` holds, panicking after five seconds.
#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition never satisfied");
}

/// Flush, wait for a dispatch past `prior_volume` to start, then wait for
/// every outstanding request to resolve.
///
/// The submitted-volume counter is incremented when a batch is handed to the
/// store, so once it moves the outstanding counter is already visible and
/// `wait_for_responses` cannot race ahead of the dispatch.
#[allow(dead_code)]
pub async fn flush_and_settle(client: &IngestClient, prior_volume: u64) {
    client.flush().await.expect("flush");
    wait_until(|| client.volume_in_bytes() > prior_volume).await;
    assert!(client.wait_for_responses(Duration::from_secs(5)).await);
}
