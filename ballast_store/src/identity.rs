//! Composite identity of a document in the remote store.

use std::fmt;

/// Composite key naming the target of a write: the container holding the
/// document, the sub-category within it, and the document id.
///
/// Two writes to the same triple address the same document regardless of the
/// operation kind, so acknowledgment grouping happens at this granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    container: String,
    category: String,
    id: String,
}

impl DocumentIdentity {
    pub fn new(
        container: impl Into<String>,
        category: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            category: category.into(),
            id: id.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of bytes the identity itself contributes to a bulk action.
    pub fn size_in_bytes(&self) -> usize {
        self.container.len() + self.category.len() + self.id.len()
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.container, self.category, self.id)
    }
}
