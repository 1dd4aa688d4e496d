//! The remote store trait and related types.

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    identity::DocumentIdentity,
    request::{WriteOperation, WriteRequest},
};

/// Outcome of a single action within a completed bulk request.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// The document the action targeted.
    pub identity: DocumentIdentity,
    /// The kind of write that was attempted.
    pub operation: WriteOperation,
    /// Whether the store applied the action.
    pub succeeded: bool,
    /// Store-supplied rejection reason, if any.
    pub reason: Option<String>,
}

/// The bulk endpoint of the remote document store.
///
/// `Ok` carries one [`ItemOutcome`] per submitted action, in no guaranteed
/// order. `Err` means the whole batch was lost with no per-item detail.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn bulk(&self, ops: &[WriteRequest]) -> StoreResult<Vec<ItemOutcome>>;
}

impl ItemOutcome {
    pub fn accepted(identity: DocumentIdentity, operation: WriteOperation) -> Self {
        Self {
            identity,
            operation,
            succeeded: true,
            reason: None,
        }
    }

    pub fn rejected(
        identity: DocumentIdentity,
        operation: WriteOperation,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            operation,
            succeeded: false,
            reason: Some(reason.into()),
        }
    }
}
