//! Per-source content-type opt-in boundary.
//!
//! Each source opts into a set of content types at creation time; that
//! configuration is owned by an external collaborator and read-only
//! here. Raw sets may contain duplicates or be empty, so both pipelines
//! normalize before use — but differently: the write path falls back to
//! `{documents}`, the read path treats an empty set as "nothing to
//! search".

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ContentType;

/// Boundary trait for per-source configuration lookup.
#[async_trait]
pub trait SourceConfigStore: Send + Sync {
    /// Enabled content types for a source, in configured order. The raw
    /// set may contain duplicates or be empty; callers normalize.
    async fn enabled_content_types(&self, source_id: &str) -> Result<Vec<ContentType>>;
}

/// Collapse duplicates (keeping first occurrence) and default an empty
/// set to `{documents}`. Used by the ingestion path, where a source with
/// nothing enabled still gets its text indexed somewhere sensible.
pub fn normalize_enabled(types: &[ContentType]) -> Vec<ContentType> {
    let mut out = dedup_enabled(types);
    if out.is_empty() {
        out.push(ContentType::Documents);
    }
    out
}

/// Collapse duplicates keeping first occurrence, without the documents
/// fallback. Used by the search path, where an empty set means an empty
/// result list rather than a default collection.
pub fn dedup_enabled(types: &[ContentType]) -> Vec<ContentType> {
    let mut out = Vec::with_capacity(types.len().min(ContentType::ALL.len()));
    for t in types {
        if !out.contains(t) {
            out.push(*t);
        }
    }
    out
}

/// Fixed-map [`SourceConfigStore`] for tests and static deployments.
#[derive(Default)]
pub struct StaticSourceConfigStore {
    sources: HashMap<String, Vec<ContentType>>,
}

impl StaticSourceConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with its enabled types.
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>, types: Vec<ContentType>) -> Self {
        self.sources.insert(source_id.into(), types);
        self
    }
}

#[async_trait]
impl SourceConfigStore for StaticSourceConfigStore {
    async fn enabled_content_types(&self, source_id: &str) -> Result<Vec<ContentType>> {
        Ok(self.sources.get(source_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_defaults_to_documents() {
        assert_eq!(normalize_enabled(&[]), vec![ContentType::Documents]);
    }

    #[test]
    fn duplicates_collapse_preserving_first_occurrence() {
        let raw = [
            ContentType::Code,
            ContentType::Documents,
            ContentType::Code,
            ContentType::Documents,
        ];
        assert_eq!(
            normalize_enabled(&raw),
            vec![ContentType::Code, ContentType::Documents]
        );
    }

    #[test]
    fn normalized_set_is_never_empty() {
        // Property over every subset of the closed enum.
        for mask in 0u8..8 {
            let raw: Vec<ContentType> = ContentType::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, t)| *t)
                .collect();
            let normalized = normalize_enabled(&raw);
            assert!(!normalized.is_empty());
            let mut deduped = normalized.clone();
            deduped.dedup();
            assert_eq!(normalized, deduped, "no duplicates after normalization");
        }
    }

    #[test]
    fn dedup_without_fallback_keeps_empty() {
        assert!(dedup_enabled(&[]).is_empty());
    }

    #[tokio::test]
    async fn static_store_returns_empty_for_unknown_source() {
        let store = StaticSourceConfigStore::new();
        assert!(store.enabled_content_types("ghost").await.unwrap().is_empty());
    }
}
