//! In-memory implementation of the remote store.
//!
//! This implementation keeps documents in memory and is suitable for testing
//! and development. Tests can inject item-level rejections for chosen
//! identities, or force the next bulk call to fail terminally.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use tracing::trace;

use crate::{
    error::{StoreResult, UnavailableSnafu},
    identity::DocumentIdentity,
    request::{WriteOperation, WriteRequest},
    store::{ItemOutcome, RemoteStore},
};

/// In-memory remote store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Documents by identity.
    documents: DashMap<DocumentIdentity, Bytes>,
    /// Identities whose writes are rejected at the item level.
    rejected: DashSet<DocumentIdentity>,
    /// When set, the next bulk call fails terminally.
    fail_next_bulk: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current body of `identity`, if the document exists.
    pub fn document(&self, identity: &DocumentIdentity) -> Option<Bytes> {
        self.documents.get(identity).map(|doc| doc.clone())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Reject every subsequent write to `identity` at the item level.
    pub fn reject_identity(&self, identity: DocumentIdentity) {
        self.rejected.insert(identity);
    }

    /// Make the next bulk call fail terminally, with no per-item outcomes.
    pub fn fail_next_bulk(&self) {
        self.fail_next_bulk.store(true, Ordering::Release);
    }

    fn apply(&self, op: &WriteRequest) -> ItemOutcome {
        if self.rejected.contains(&op.identity) {
            return ItemOutcome::rejected(op.identity.clone(), op.operation, "rejected by store");
        }

        match op.operation {
            WriteOperation::Index => {
                self.documents
                    .insert(op.identity.clone(), op.source.clone().unwrap_or_default());
                ItemOutcome::accepted(op.identity.clone(), op.operation)
            }
            WriteOperation::Update => match self.documents.get_mut(&op.identity) {
                Some(mut doc) => {
                    *doc = op.source.clone().unwrap_or_default();
                    ItemOutcome::accepted(op.identity.clone(), op.operation)
                }
                None => {
                    ItemOutcome::rejected(op.identity.clone(), op.operation, "document missing")
                }
            },
            WriteOperation::Delete => {
                self.documents.remove(&op.identity);
                ItemOutcome::accepted(op.identity.clone(), op.operation)
            }
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn bulk(&self, ops: &[WriteRequest]) -> StoreResult<Vec<ItemOutcome>> {
        if self.fail_next_bulk.swap(false, Ordering::AcqRel) {
            return UnavailableSnafu {
                message: "injected transport failure",
            }
            .fail();
        }

        trace!(actions = ops.len(), "InMemoryStore::bulk");

        Ok(ops.iter().map(|op| self.apply(op)).collect())
    }
}
