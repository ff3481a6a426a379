//! Embedding provider boundary, memoizing generator, and cache store.
//!
//! [`Embedder`] is the write/read paths' single entry point for turning
//! text into vectors. It hashes the text, consults an
//! [`EmbeddingCacheStore`], and only on a miss calls the configured
//! [`EmbeddingProvider`], retrying transient failures under the shared
//! [`RetryPolicy`]. A successful embedding is upserted back into the
//! cache keyed by `(content hash, model name)`, so the same text under
//! two models occupies two distinct entries.
//!
//! The generator never passes off an empty vector as a valid embedding:
//! callers can always distinguish "no embedding" from "embedding".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Boundary trait for embedding backends.
///
/// The model name is passed per call because different collections embed
/// with different models.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text with the named model.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;

    /// Embed a batch with the named model, returning vectors in input
    /// order. The default implementation loops over [`embed`](Self::embed);
    /// backends with a native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, model).await?);
        }
        Ok(out)
    }
}

/// Boundary trait for the durable embedding cache.
#[async_trait]
pub trait EmbeddingCacheStore: Send + Sync {
    async fn get(&self, content_hash: &str, model: &str) -> Result<Option<Vec<f32>>>;

    /// Idempotent upsert: a conflicting write replaces the entry rather
    /// than appending. Last-writer-wins is fine because values for the
    /// same key are value-identical by construction.
    async fn put(&self, content_hash: &str, model: &str, vector: Vec<f32>) -> Result<()>;
}

/// SHA-256 of the text, lowercase hex. Cache key component.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Partial result of a batch embedding pass.
///
/// `vectors[i]` is `None` when text `i` failed after retries; one bad
/// text never discards the rest of the batch.
#[derive(Debug)]
pub struct BatchEmbeddings {
    pub vectors: Vec<Option<Vec<f32>>>,
    pub failed: usize,
}

/// Cache-first embedding generator.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCacheStore>,
    retry: RetryPolicy,
}

impl Embedder {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn EmbeddingCacheStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
        }
    }

    /// Embed one text, consulting the cache first.
    ///
    /// Cache read/write failures are logged and treated as misses; only
    /// provider exhaustion surfaces as an error.
    pub async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let hash = content_hash(text);

        match self.cache.get(&hash, model).await {
            Ok(Some(vector)) => {
                debug!(model, "embedding cache hit");
                return Ok(vector);
            }
            Ok(None) => {}
            Err(e) => warn!(model, error = %e, "embedding cache read failed, treating as miss"),
        }

        let vector = self.embed_with_retry(text, model).await?;
        if vector.is_empty() {
            return Err(Error::EmptyEmbedding {
                model: model.to_string(),
            });
        }

        if let Err(e) = self.cache.put(&hash, model, vector.clone()).await {
            warn!(model, error = %e, "embedding cache write failed");
        }
        Ok(vector)
    }

    /// Embed a batch, skipping failures at per-text granularity.
    ///
    /// Cache hits are resolved first; the misses go to the provider in
    /// one [`embed_batch`](EmbeddingProvider::embed_batch) call. When
    /// that call fails or returns a malformed count, each miss falls
    /// back to the retrying single-embed path, so failures stay
    /// per-text either way.
    pub async fn embed_batch(&self, texts: &[String], model: &str) -> BatchEmbeddings {
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let hash = content_hash(text);
            match self.cache.get(&hash, model).await {
                Ok(Some(vector)) => {
                    debug!(model, "embedding cache hit");
                    vectors[i] = Some(vector);
                }
                Ok(None) => misses.push(i),
                Err(e) => {
                    warn!(model, error = %e, "embedding cache read failed, treating as miss");
                    misses.push(i);
                }
            }
        }

        if misses.is_empty() {
            return BatchEmbeddings { vectors, failed: 0 };
        }

        let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
        let mut failed = 0usize;
        match self.provider.embed_batch(&miss_texts, model).await {
            Ok(embedded) if embedded.len() == misses.len() => {
                for (&i, vector) in misses.iter().zip(embedded) {
                    if vector.is_empty() {
                        warn!(model, "provider returned an empty vector, skipping text");
                        failed += 1;
                        continue;
                    }
                    let hash = content_hash(&texts[i]);
                    if let Err(e) = self.cache.put(&hash, model, vector.clone()).await {
                        warn!(model, error = %e, "embedding cache write failed");
                    }
                    vectors[i] = Some(vector);
                }
            }
            Ok(embedded) => {
                warn!(
                    model,
                    expected = misses.len(),
                    got = embedded.len(),
                    "batch embedding returned wrong count, falling back to single calls"
                );
                failed = self.embed_misses_singly(texts, &misses, model, &mut vectors).await;
            }
            Err(e) => {
                warn!(model, error = %e, "batch embedding failed, falling back to single calls");
                failed = self.embed_misses_singly(texts, &misses, model, &mut vectors).await;
            }
        }

        BatchEmbeddings { vectors, failed }
    }

    async fn embed_misses_singly(
        &self,
        texts: &[String],
        misses: &[usize],
        model: &str,
        vectors: &mut [Option<Vec<f32>>],
    ) -> usize {
        let mut failed = 0;
        for &i in misses {
            match self.embed(&texts[i], model).await {
                Ok(v) => vectors[i] = Some(v),
                Err(e) => {
                    warn!(model, error = %e, "embedding failed, skipping text");
                    failed += 1;
                }
            }
        }
        failed
    }

    async fn embed_with_retry(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.embed(text, model).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient embedding failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// In-memory [`EmbeddingCacheStore`] for tests and single-process use.
#[derive(Default)]
pub struct InMemoryEmbeddingCache {
    entries: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl InMemoryEmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct `(hash, model)` entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EmbeddingCacheStore for InMemoryEmbeddingCache {
    async fn get(&self, content_hash: &str, model: &str) -> Result<Option<Vec<f32>>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .get(&(content_hash.to_string(), model.to_string()))
            .cloned())
    }

    async fn put(&self, content_hash: &str, model: &str, vector: Vec<f32>) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert((content_hash.to_string(), model.to_string()), vector);
        Ok(())
    }
}

/// Embedding provider backed by an OpenAI-compatible HTTP API.
///
/// Calls `POST {base_url}/v1/embeddings` with the model named per
/// request. Single-shot: transient failures are reported as
/// [`Error::ProviderTransient`] and retried by the [`Embedder`], not
/// here, so there is exactly one retry loop per embedding.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Build a provider against `https://api.openai.com`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
        })
    }

    /// Point the provider at a compatible server (proxy, local gateway).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ProviderTransient(format!(
                "HTTP {status}: {body_text}"
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::ProviderFatal(format!("HTTP {status}: {body_text}")));
        }

        let json: serde_json::Value = response.json().await?;
        parse_embeddings_response(&json, texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let vectors = self.request(&[text.to_string()], model).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("empty data array".to_string()))
    }

    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        self.request(texts, model).await
    }
}

/// Extract `data[].embedding` arrays in input order.
fn parse_embeddings_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::InvalidResponse("missing data array".to_string()))?;

    if data.len() != expected {
        return Err(Error::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let values = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::InvalidResponse("missing embedding field".to_string()))?;
        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vector);
    }
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that returns a fixed-dimension vector derived from the
    /// text, optionally failing the first N calls.
    struct FlakyProvider {
        dims: usize,
        failures_remaining: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(dims: usize, failures: usize) -> Self {
            Self {
                dims,
                failures_remaining: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::ProviderTransient("simulated 429".to_string()));
            }
            let seed = text.len() as f32;
            Ok((0..self.dims).map(|i| seed + i as f32).collect())
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn embedder(provider: Arc<dyn EmbeddingProvider>, cache: Arc<InMemoryEmbeddingCache>) -> Embedder {
        Embedder::new(provider, cache, fast_retry(3))
    }

    #[test]
    fn content_hash_is_stable_and_distinct() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let provider = Arc::new(FlakyProvider::new(4, 0));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider.clone(), cache.clone());

        let first = e.embed("hello", "model-a").await.unwrap();
        let second = e.embed("hello", "model-a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn same_text_different_models_are_distinct_entries() {
        let provider = Arc::new(FlakyProvider::new(4, 0));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider, cache.clone());

        e.embed("hello", "model-a").await.unwrap();
        e.embed("hello", "model-b").await.unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let provider = Arc::new(FlakyProvider::new(4, 2));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider.clone(), cache);

        let vector = e.embed("hello", "model-a").await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_an_error() {
        let provider = Arc::new(FlakyProvider::new(4, 10));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider, cache.clone());

        let err = e.embed("hello", "model-a").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(cache.len(), 0, "failed embedding must not be cached");
    }

    /// Provider that counts single and batch calls separately.
    struct CountingProvider {
        dims: usize,
        single_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        last_batch_len: AtomicUsize,
    }

    impl CountingProvider {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                single_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                last_batch_len: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32; self.dims])
        }

        async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.last_batch_len.store(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32; self.dims])
                .collect())
        }
    }

    #[tokio::test]
    async fn batch_goes_through_the_provider_batch_endpoint() {
        let provider = Arc::new(CountingProvider::new(4));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider.clone(), cache.clone());

        let texts: Vec<String> = (0..5).map(|i| format!("text-{i}")).collect();
        let batch = e.embed_batch(&texts, "m").await;
        assert_eq!(batch.failed, 0);
        assert!(batch.vectors.iter().all(|v| v.is_some()));
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.len(), 5);
    }

    #[tokio::test]
    async fn batch_only_sends_cache_misses_to_the_provider() {
        let provider = Arc::new(CountingProvider::new(4));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider.clone(), cache.clone());

        e.embed("text-1", "m").await.unwrap();
        let texts = vec![
            "text-0".to_string(),
            "text-1".to_string(),
            "text-2".to_string(),
        ];
        let batch = e.embed_batch(&texts, "m").await;
        assert_eq!(batch.failed, 0);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.last_batch_len.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn failed_batch_call_falls_back_to_single_embeds() {
        struct BatchDown(CountingProvider);

        #[async_trait]
        impl EmbeddingProvider for BatchDown {
            async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
                self.0.embed(text, model).await
            }

            async fn embed_batch(&self, _texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
                self.0.batch_calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::ProviderTransient("batch endpoint down".to_string()))
            }
        }

        let provider = Arc::new(BatchDown(CountingProvider::new(4)));
        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = embedder(provider.clone(), cache.clone());

        let texts: Vec<String> = (0..3).map(|i| format!("text-{i}")).collect();
        let batch = e.embed_batch(&texts, "m").await;
        assert_eq!(batch.failed, 0);
        assert!(batch.vectors.iter().all(|v| v.is_some()));
        assert_eq!(provider.0.single_calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn batch_keeps_partial_results() {
        struct RejectLong;
        #[async_trait]
        impl EmbeddingProvider for RejectLong {
            async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
                if text.len() > 10 {
                    return Err(Error::ProviderFatal("too long".to_string()));
                }
                Ok(vec![1.0, 2.0])
            }
        }

        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = Embedder::new(Arc::new(RejectLong), cache, fast_retry(2));
        let texts = vec![
            "short".to_string(),
            "a very long text that fails".to_string(),
            "tiny".to_string(),
        ];
        let batch = e.embed_batch(&texts, "m").await;
        assert_eq!(batch.failed, 1);
        assert!(batch.vectors[0].is_some());
        assert!(batch.vectors[1].is_none());
        assert!(batch.vectors[2].is_some());
    }

    #[tokio::test]
    async fn empty_vector_is_rejected() {
        struct EmptyProvider;
        #[async_trait]
        impl EmbeddingProvider for EmptyProvider {
            async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
                Ok(Vec::new())
            }
        }

        let cache = Arc::new(InMemoryEmbeddingCache::new());
        let e = Embedder::new(Arc::new(EmptyProvider), cache, fast_retry(1));
        let err = e.embed("hello", "model-a").await.unwrap_err();
        assert!(matches!(err, Error::EmptyEmbedding { .. }));
    }

    #[test]
    fn parse_response_extracts_vectors_in_order() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2], "index": 0},
                {"embedding": [0.3, 0.4], "index": 1},
            ]
        });
        let parsed = parse_embeddings_response(&json, 2).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], vec![0.1, 0.2]);
    }

    #[test]
    fn parse_response_rejects_missing_data() {
        let json = serde_json::json!({"error": "nope"});
        assert!(parse_embeddings_response(&json, 1).is_err());
    }

    #[test]
    fn parse_response_rejects_wrong_count() {
        let json = serde_json::json!({"data": [{"embedding": [0.1]}]});
        assert!(parse_embeddings_response(&json, 2).is_err());
    }
}
