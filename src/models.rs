//! Core data models used throughout the routing and search pipeline.
//!
//! These types represent the chunks, points, and results that flow through
//! ingestion and retrieval. None of them are durable: vectors and cache
//! entries live behind the boundary traits in [`crate::store`],
//! [`crate::embedding`], and [`crate::sources`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discrete category of content driving collection routing.
///
/// The set is closed: every `match` over it is exhaustive, so adding a
/// variant forces every routing decision to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Documents,
    Code,
    Media,
}

impl ContentType {
    /// Every content type, in canonical order.
    pub const ALL: [ContentType; 3] =
        [ContentType::Documents, ContentType::Code, ContentType::Media];

    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Documents => "documents",
            ContentType::Code => "code",
            ContentType::Media => "media",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of content to embed and index.
///
/// Chunks are produced by upstream chunking; this crate classifies them,
/// embeds them, and hands them off to the vector store.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub text: String,
    /// Assigned exactly once per ingestion pass by the classifier.
    pub content_type: Option<ContentType>,
}

impl Chunk {
    /// Create a chunk with a generated UUID.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            text: text.into(),
            content_type: None,
        }
    }

    /// Create a chunk with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        source_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            text: text.into(),
            content_type: None,
        }
    }
}

/// A vector plus payload metadata, as written to a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// A point returned from a collection query, scored by similarity
/// (higher is more relevant).
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Payload predicate applied at query time.
///
/// Currently supports source-id equality, which is all the authorization
/// filtering the read path needs.
#[derive(Debug, Clone, Default)]
pub struct PayloadFilter {
    pub source_id: Option<String>,
}

impl PayloadFilter {
    /// Filter for points ingested from one source.
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
        }
    }

    /// Whether a point payload satisfies this filter.
    pub fn matches(&self, payload: &serde_json::Value) -> bool {
        match &self.source_id {
            Some(sid) => payload.get("source_id").and_then(|v| v.as_str()) == Some(sid.as_str()),
            None => true,
        }
    }
}

/// One ranked hit from the search aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub score: f32,
    /// The collection this hit came from; always one of the collections
    /// actually queried.
    pub content_type: ContentType,
    pub payload: serde_json::Value,
}

/// Aggregated outcome of one ingestion call.
///
/// Partial success is the normal case: callers inspect this report rather
/// than parsing log output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    /// Chunks handed to the router, before filtering.
    pub total_chunks: usize,
    /// Chunks written to a collection, across all groups.
    pub stored: usize,
    /// Chunks dropped because their classified type was not enabled for
    /// the source. A deliberate filter, not an error.
    pub filtered_out: usize,
    /// Chunks dropped because embedding failed after retries.
    pub embedding_failed: usize,
    /// Chunks dropped because the target collection's write failed.
    pub store_failed: usize,
    /// Per-group outcomes, in canonical content-type order.
    pub groups: Vec<GroupOutcome>,
}

impl IngestionReport {
    /// Chunks stored for one content type (0 if the group did not run).
    pub fn stored_for(&self, content_type: ContentType) -> usize {
        self.groups
            .iter()
            .filter(|g| g.content_type == content_type)
            .map(|g| g.stored)
            .sum()
    }
}

/// Outcome of one per-content-type ingestion group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    pub content_type: ContentType,
    /// Target collection name, resolved through the registry.
    pub collection: String,
    /// Chunks routed into this group.
    pub attempted: usize,
    /// Chunks successfully embedded and upserted.
    pub stored: usize,
    /// Chunks skipped at per-chunk granularity because embedding failed.
    pub embedding_failed: usize,
    /// Store-level failure for this group, if any. Sibling groups are
    /// unaffected.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContentType::Documents).unwrap();
        assert_eq!(json, "\"documents\"");
        let back: ContentType = serde_json::from_str("\"media\"").unwrap();
        assert_eq!(back, ContentType::Media);
    }

    #[test]
    fn payload_filter_matches_source() {
        let filter = PayloadFilter::source("src-1");
        assert!(filter.matches(&serde_json::json!({"source_id": "src-1"})));
        assert!(!filter.matches(&serde_json::json!({"source_id": "src-2"})));
        assert!(!filter.matches(&serde_json::json!({})));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = PayloadFilter::default();
        assert!(filter.matches(&serde_json::json!({})));
        assert!(filter.matches(&serde_json::json!({"source_id": "anything"})));
    }

    #[test]
    fn chunk_new_generates_distinct_ids() {
        let a = Chunk::new("s", "text");
        let b = Chunk::new("s", "text");
        assert_ne!(a.id, b.id);
    }
}
