use std::fmt;

use bytes::Bytes;

use crate::identity::DocumentIdentity;

/// Fixed per-action overhead, approximating the envelope the bulk wire
/// format wraps around every action.
const ACTION_OVERHEAD_BYTES: usize = 50;

/// The kind of write applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    Index,
    Update,
    Delete,
}

/// A single write destined for the store's bulk endpoint.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// The kind of write.
    pub operation: WriteOperation,
    /// The document the write targets.
    pub identity: DocumentIdentity,
    /// Serialized document body; `None` for deletes.
    pub source: Option<Bytes>,
}

impl WriteRequest {
    pub fn index(identity: DocumentIdentity, source: Bytes) -> Self {
        Self {
            operation: WriteOperation::Index,
            identity,
            source: Some(source),
        }
    }

    pub fn update(identity: DocumentIdentity, source: Bytes) -> Self {
        Self {
            operation: WriteOperation::Update,
            identity,
            source: Some(source),
        }
    }

    pub fn delete(identity: DocumentIdentity) -> Self {
        Self {
            operation: WriteOperation::Delete,
            identity,
            source: None,
        }
    }

    /// Estimated contribution of this action to a bulk request, in bytes.
    pub fn estimated_size_in_bytes(&self) -> u64 {
        let source_len = self.source.as_ref().map(Bytes::len).unwrap_or(0);
        (self.identity.size_in_bytes() + source_len + ACTION_OVERHEAD_BYTES) as u64
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOperation::Index => write!(f, "index"),
            WriteOperation::Update => write!(f, "update"),
            WriteOperation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_size_includes_source() {
        let identity = DocumentIdentity::new("logs", "event", "1");
        let indexed = WriteRequest::index(identity.clone(), Bytes::from_static(b"0123456789"));
        let deleted = WriteRequest::delete(identity);

        assert_eq!(
            indexed.estimated_size_in_bytes(),
            deleted.estimated_size_in_bytes() + 10
        );
    }
}
