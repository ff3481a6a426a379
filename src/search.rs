//! Cross-collection search aggregation.
//!
//! One query fans out across the enabled collections concurrently; the
//! per-collection result lists are merged, re-ranked by score, and
//! truncated into a single deterministically-ordered answer. A failed
//! collection is logged and omitted; the call only fails when every
//! candidate collection failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::{ContentType, PayloadFilter, SearchResult};
use crate::registry::CollectionRegistry;
use crate::sources::{dedup_enabled, SourceConfigStore};
use crate::store::VectorStoreAdapter;

/// Fans a query out across collections and merges the results.
pub struct SearchAggregator {
    registry: Arc<CollectionRegistry>,
    embedder: Arc<Embedder>,
    store: Arc<VectorStoreAdapter>,
    sources: Arc<dyn SourceConfigStore>,
    /// Deadline for each per-collection query.
    query_timeout: Duration,
}

impl SearchAggregator {
    pub fn new(
        registry: Arc<CollectionRegistry>,
        embedder: Arc<Embedder>,
        store: Arc<VectorStoreAdapter>,
        sources: Arc<dyn SourceConfigStore>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            embedder,
            store,
            sources,
            query_timeout,
        }
    }

    /// Search the enabled collections for `query`.
    ///
    /// With a `source_filter`, only that source's currently-enabled
    /// collections are queried and results are restricted to its points;
    /// an empty enabled set yields an empty result list, not an error,
    /// while a failed config lookup surfaces as
    /// [`Error::SourceConfig`]. Without a filter, every known collection
    /// is queried.
    pub async fn search(
        &self,
        query: &str,
        source_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let candidates: Vec<ContentType> = match source_filter {
            Some(source_id) => {
                // A config lookup failure is not an empty enabled set:
                // the caller asked about one specific source, so a down
                // config store surfaces instead of masquerading as "no
                // results".
                let enabled = self
                    .sources
                    .enabled_content_types(source_id)
                    .await
                    .map_err(|e| Error::SourceConfig {
                        source_id: source_id.to_string(),
                        reason: e.to_string(),
                    })?;
                dedup_enabled(&enabled)
            }
            None => ContentType::ALL.to_vec(),
        };

        if candidates.is_empty() {
            debug!("no candidate collections for query");
            return Ok(Vec::new());
        }

        // Embed the query exactly once, with the canonical documents
        // model, so scores stay comparable across collections.
        let model = self.registry.resolve(ContentType::Documents).model.clone();
        let query_vec = Arc::new(self.embedder.embed(query, &model).await?);

        // Over-fetch per collection to give the merge re-ranking headroom.
        let fetch_k = limit.saturating_mul(2);
        let filter = source_filter.map(PayloadFilter::source);
        let attempted = candidates.len();

        // Fan-out is bounded by the number of content types.
        let mut tasks = JoinSet::new();
        for content_type in candidates {
            let store = Arc::clone(&self.store);
            let query_vec = Arc::clone(&query_vec);
            let filter = filter.clone();
            let timeout = self.query_timeout;
            tasks.spawn(async move {
                let work = store.query(content_type, &query_vec, filter.as_ref(), fetch_k);
                let result = match tokio::time::timeout(timeout, work).await {
                    Ok(r) => r,
                    Err(_) => Err(Error::Timeout(timeout)),
                };
                (content_type, result)
            });
        }

        let mut merged: Vec<SearchResult> = Vec::new();
        let mut failures = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((content_type, Ok(points))) => {
                    merged.extend(points.into_iter().map(|p| SearchResult {
                        chunk_id: p.id,
                        score: p.score,
                        content_type,
                        payload: p.payload,
                    }));
                }
                Ok((content_type, Err(e))) => {
                    warn!(%content_type, error = %e, "collection query failed, omitting");
                    failures += 1;
                }
                Err(e) => {
                    warn!(error = %e, "search task failed to run");
                    failures += 1;
                }
            }
        }

        if failures == attempted {
            return Err(Error::AllCollectionsFailed {
                operation: "search",
                attempted,
            });
        }

        Ok(merge_and_rank(merged, limit))
    }
}

/// Sort results by score descending (chunk-id ascending on ties, for
/// deterministic output) and truncate to `limit`.
fn merge_and_rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results.truncate(limit);
    results
}
