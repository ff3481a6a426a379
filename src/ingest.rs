//! Ingestion routing: classify, filter, group, embed, and store chunks.
//!
//! Groups are processed concurrently and fail independently: embedding
//! exhaustion or store unavailability in one group never aborts its
//! siblings. The call fails outright only when groups ran and zero
//! chunks were stored across all of them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::classifier::{classify, ClassifierConfig};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::models::{Chunk, ContentType, GroupOutcome, IngestionReport, Point};
use crate::registry::CollectionRegistry;
use crate::sources::{normalize_enabled, SourceConfigStore};
use crate::store::VectorStoreAdapter;

/// Routes chunks into their type-specific collections.
pub struct IngestionRouter {
    registry: Arc<CollectionRegistry>,
    embedder: Arc<Embedder>,
    store: Arc<VectorStoreAdapter>,
    sources: Arc<dyn SourceConfigStore>,
    classifier: ClassifierConfig,
    /// Deadline for one group's embed + write work.
    group_timeout: Duration,
}

impl IngestionRouter {
    pub fn new(
        registry: Arc<CollectionRegistry>,
        embedder: Arc<Embedder>,
        store: Arc<VectorStoreAdapter>,
        sources: Arc<dyn SourceConfigStore>,
        classifier: ClassifierConfig,
        group_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            embedder,
            store,
            sources,
            classifier,
            group_timeout,
        }
    }

    /// Ingest chunks for one source.
    ///
    /// Chunks whose classified type is not enabled for the source are
    /// dropped and counted, not treated as errors. Returns
    /// [`Error::AllCollectionsFailed`] only when at least one group ran
    /// and no chunk was stored anywhere.
    pub async fn ingest(&self, source_id: &str, chunks: Vec<Chunk>) -> Result<IngestionReport> {
        let total_chunks = chunks.len();

        let enabled = match self.sources.enabled_content_types(source_id).await {
            Ok(types) => normalize_enabled(&types),
            Err(e) => {
                warn!(source_id, error = %e, "source config unavailable, defaulting to documents");
                vec![ContentType::Documents]
            }
        };

        // Classify every chunk, then drop the ones whose type the source
        // has not enabled. BTreeMap keeps group order canonical.
        let mut groups: BTreeMap<ContentType, Vec<Chunk>> = BTreeMap::new();
        let mut filtered_out = 0usize;
        for mut chunk in chunks {
            let content_type = classify(&chunk.text, &self.classifier);
            chunk.content_type = Some(content_type);
            if enabled.contains(&content_type) {
                groups.entry(content_type).or_default().push(chunk);
            } else {
                debug!(
                    chunk_id = %chunk.id,
                    %content_type,
                    "chunk type not enabled for source, dropping"
                );
                filtered_out += 1;
            }
        }

        let group_count = groups.len();
        // Fan-out is bounded by the number of content types.
        let mut tasks: JoinSet<GroupOutcome> = JoinSet::new();
        for (content_type, group) in groups {
            let registry = Arc::clone(&self.registry);
            let embedder = Arc::clone(&self.embedder);
            let store = Arc::clone(&self.store);
            let source_id = source_id.to_string();
            let timeout = self.group_timeout;
            let collection = registry.resolve(content_type).collection_name.clone();
            let attempted = group.len();

            tasks.spawn(async move {
                let work = ingest_group(registry, embedder, store, source_id, content_type, group);
                match tokio::time::timeout(timeout, work).await {
                    Ok(outcome) => outcome,
                    Err(_) => GroupOutcome {
                        content_type,
                        collection,
                        attempted,
                        stored: 0,
                        embedding_failed: 0,
                        error: Some(Error::Timeout(timeout).to_string()),
                    },
                }
            });
        }

        let mut report = IngestionReport {
            total_chunks,
            filtered_out,
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.stored += outcome.stored;
                    report.embedding_failed += outcome.embedding_failed;
                    if outcome.error.is_some() {
                        report.store_failed +=
                            outcome.attempted - outcome.stored - outcome.embedding_failed;
                    }
                    report.groups.push(outcome);
                }
                Err(e) => {
                    warn!(error = %e, "ingestion group task failed to run");
                }
            }
        }
        report.groups.sort_by_key(|g| g.content_type);

        if group_count > 0 && report.stored == 0 {
            return Err(Error::AllCollectionsFailed {
                operation: "ingest",
                attempted: group_count,
            });
        }
        Ok(report)
    }
}

/// Embed and write one content-type group. Infallible by design: every
/// failure mode is folded into the returned outcome.
async fn ingest_group(
    registry: Arc<CollectionRegistry>,
    embedder: Arc<Embedder>,
    store: Arc<VectorStoreAdapter>,
    source_id: String,
    content_type: ContentType,
    chunks: Vec<Chunk>,
) -> GroupOutcome {
    let spec = registry.resolve(content_type);
    let attempted = chunks.len();
    let mut outcome = GroupOutcome {
        content_type,
        collection: spec.collection_name.clone(),
        attempted,
        stored: 0,
        embedding_failed: 0,
        error: None,
    };

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let batch = embedder.embed_batch(&texts, &spec.model).await;
    outcome.embedding_failed = batch.failed;

    let ingested_at = Utc::now().to_rfc3339();
    let points: Vec<Point> = chunks
        .iter()
        .zip(batch.vectors)
        .filter_map(|(chunk, vector)| {
            vector.map(|v| Point {
                id: chunk.id.clone(),
                vector: v,
                payload: serde_json::json!({
                    "source_id": source_id,
                    "content_type": content_type,
                    "text": chunk.text,
                    "ingested_at": ingested_at,
                }),
            })
        })
        .collect();

    if points.is_empty() {
        if outcome.embedding_failed == attempted {
            warn!(%content_type, attempted, "every chunk in group failed to embed");
        }
        return outcome;
    }

    let to_store = points.len();
    let write = async {
        store.ensure_collection(content_type).await?;
        store.upsert(content_type, points).await
    };
    match write.await {
        Ok(()) => {
            outcome.stored = to_store;
            debug!(collection = %outcome.collection, stored = to_store, "group stored");
        }
        Err(e) => {
            warn!(collection = %outcome.collection, error = %e, "group write failed");
            outcome.error = Some(e.to_string());
        }
    }
    outcome
}
