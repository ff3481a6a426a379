//! Vector store boundary, dimension-checked adapter, and in-memory
//! reference store.
//!
//! [`VectorStoreClient`] is the contract an external vector index must
//! satisfy; [`VectorStoreAdapter`] layers the collection registry on top
//! so callers speak in content types while the client speaks in collection
//! names, and so wrong-length vectors are rejected before any network
//! call. [`InMemoryVectorStore`] is a brute-force reference
//! implementation used by tests and small deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ContentType, PayloadFilter, Point, ScoredPoint};
use crate::registry::CollectionRegistry;

/// Similarity metric a collection is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

/// Boundary contract for an external vector index.
#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    /// Idempotent create-if-absent. A no-op when the collection already
    /// exists with a matching dimension; an error when the dimension
    /// differs.
    async fn ensure_exists(&self, name: &str, dims: usize, metric: DistanceMetric) -> Result<()>;

    /// Write points into a named collection, replacing points with the
    /// same id.
    async fn upsert(&self, name: &str, points: Vec<Point>) -> Result<()>;

    /// Up to `top_k` nearest points by similarity, optionally filtered by
    /// payload predicate.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        filter: Option<&PayloadFilter>,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>>;
}

/// Registry-aware shim over a [`VectorStoreClient`].
///
/// Resolves collection names and dimensions through the registry so the
/// write and read paths cannot drift apart, and enforces the dimension
/// contract locally.
pub struct VectorStoreAdapter {
    client: Arc<dyn VectorStoreClient>,
    registry: Arc<CollectionRegistry>,
}

impl VectorStoreAdapter {
    pub fn new(client: Arc<dyn VectorStoreClient>, registry: Arc<CollectionRegistry>) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Ensure the collection backing `content_type` exists at its
    /// configured dimension.
    pub async fn ensure_collection(&self, content_type: ContentType) -> Result<()> {
        let spec = self.registry.resolve(content_type);
        self.client
            .ensure_exists(&spec.collection_name, spec.dims, DistanceMetric::Cosine)
            .await
    }

    /// Upsert points, rejecting any wrong-length vector before the client
    /// is called. A rejected batch writes nothing.
    pub async fn upsert(&self, content_type: ContentType, points: Vec<Point>) -> Result<()> {
        let spec = self.registry.resolve(content_type);
        for point in &points {
            if point.vector.len() != spec.dims {
                return Err(Error::DimensionMismatch {
                    collection: spec.collection_name.clone(),
                    expected: spec.dims,
                    actual: point.vector.len(),
                });
            }
        }
        debug!(collection = %spec.collection_name, count = points.len(), "upserting points");
        self.client.upsert(&spec.collection_name, points).await
    }

    /// Query the collection backing `content_type`.
    pub async fn query(
        &self,
        content_type: ContentType,
        vector: &[f32],
        filter: Option<&PayloadFilter>,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let spec = self.registry.resolve(content_type);
        self.client
            .query(&spec.collection_name, vector, filter, top_k)
            .await
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

struct StoredCollection {
    dims: usize,
    metric: DistanceMetric,
    points: HashMap<String, Point>,
}

impl StoredCollection {
    fn score(&self, query: &[f32], point: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Cosine => cosine_similarity(query, point),
            DistanceMetric::Dot => query.iter().zip(point.iter()).map(|(a, b)| a * b).sum(),
            // Negated distance so higher is still more similar.
            DistanceMetric::Euclid => {
                -query
                    .iter()
                    .zip(point.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt()
            }
        }
    }
}

/// In-memory [`VectorStoreClient`] with brute-force similarity search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, if it exists. Test helper.
    pub fn collection_len(&self, name: &str) -> Option<usize> {
        let collections = self.collections.read().unwrap();
        collections.get(name).map(|c| c.points.len())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.read().unwrap().contains_key(name)
    }
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn ensure_exists(&self, name: &str, dims: usize, metric: DistanceMetric) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        match collections.get(name) {
            Some(existing) if existing.dims == dims => Ok(()),
            Some(existing) => Err(Error::DimensionMismatch {
                collection: name.to_string(),
                expected: existing.dims,
                actual: dims,
            }),
            None => {
                collections.insert(
                    name.to_string(),
                    StoredCollection {
                        dims,
                        metric,
                        points: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, name: &str, points: Vec<Point>) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::CollectionUnavailable {
                collection: name.to_string(),
                reason: "collection does not exist".to_string(),
            })?;

        // Validate the whole batch before writing any point.
        for point in &points {
            if point.vector.len() != collection.dims {
                return Err(Error::DimensionMismatch {
                    collection: name.to_string(),
                    expected: collection.dims,
                    actual: point.vector.len(),
                });
            }
        }
        for point in points {
            collection.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        filter: Option<&PayloadFilter>,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().unwrap();
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::CollectionUnavailable {
                collection: name.to_string(),
                reason: "collection does not exist".to_string(),
            })?;

        let mut scored: Vec<ScoredPoint> = collection
            .points
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: collection.score(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, source_id: &str) -> Point {
        Point {
            id: id.to_string(),
            vector,
            payload: serde_json::json!({"source_id": source_id}),
        }
    }

    #[tokio::test]
    async fn ensure_exists_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store
            .ensure_exists("c", 3, DistanceMetric::Cosine)
            .await
            .unwrap();
        store
            .ensure_exists("c", 3, DistanceMetric::Cosine)
            .await
            .unwrap();
        assert!(store.has_collection("c"));
    }

    #[tokio::test]
    async fn ensure_exists_rejects_dimension_change() {
        let store = InMemoryVectorStore::new();
        store
            .ensure_exists("c", 1536, DistanceMetric::Cosine)
            .await
            .unwrap();
        let err = store
            .ensure_exists("c", 100, DistanceMetric::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 1536, actual: 100, .. }));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dims_without_partial_write() {
        let store = InMemoryVectorStore::new();
        store
            .ensure_exists("c", 3, DistanceMetric::Cosine)
            .await
            .unwrap();

        let points = vec![
            point("p1", vec![1.0, 0.0, 0.0], "s"),
            point("p2", vec![1.0, 0.0], "s"), // wrong length
        ];
        let err = store.upsert("c", points).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(store.collection_len("c"), Some(0));
    }

    #[tokio::test]
    async fn upsert_replaces_points_with_same_id() {
        let store = InMemoryVectorStore::new();
        store
            .ensure_exists("c", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        store
            .upsert("c", vec![point("p1", vec![1.0, 0.0], "s")])
            .await
            .unwrap();
        store
            .upsert("c", vec![point("p1", vec![0.0, 1.0], "s")])
            .await
            .unwrap();
        assert_eq!(store.collection_len("c"), Some(1));
    }

    #[tokio::test]
    async fn query_orders_by_similarity_and_respects_filter() {
        let store = InMemoryVectorStore::new();
        store
            .ensure_exists("c", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        store
            .upsert(
                "c",
                vec![
                    point("aligned", vec![1.0, 0.0], "s1"),
                    point("orthogonal", vec![0.0, 1.0], "s1"),
                    point("other-source", vec![1.0, 0.0], "s2"),
                ],
            )
            .await
            .unwrap();

        let filter = PayloadFilter::source("s1");
        let results = store
            .query("c", &[1.0, 0.0], Some(&filter), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "aligned");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn query_missing_collection_is_unavailable() {
        let store = InMemoryVectorStore::new();
        let err = store.query("absent", &[1.0], None, 5).await.unwrap_err();
        assert!(matches!(err, Error::CollectionUnavailable { .. }));
    }

    #[test]
    fn cosine_basics() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
