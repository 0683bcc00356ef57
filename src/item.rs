//! Core item type stored and searched by the engine.

use serde::{Deserialize, Serialize};

/// A searchable record: a user-supplied id, the text indexed for
/// retrieval, and an optional free-form metadata payload.
///
/// Ids are opaque and unique within an engine; adding an item with an
/// existing id replaces the whole record. Metadata is carried verbatim
/// and only inspected by [`MetadataFilter`](crate::search::MetadataFilter)
/// predicates at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the engine.
    pub id: String,
    /// Text content, embedded and matched by the similarity kernels.
    pub text: String,
    /// Arbitrary payload for filtering; skipped on the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Item {
    /// Creates an item without metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }

    /// Creates an item with a metadata payload.
    pub fn with_metadata(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Some(metadata),
        }
    }
}
