//! # Vector Mux
//!
//! Content classification, multi-collection vector routing, and search
//! aggregation for retrieval-augmented pipelines.
//!
//! Chunks are classified into a closed set of content types
//! (`documents`, `code`, `media`), embedded with a per-type model, and
//! written into per-type vector collections. Queries fan out across the
//! enabled collections concurrently and merge into one ranked answer.
//!
//! ## Architecture
//!
//! ```text
//!           chunks                       query
//!             │                            │
//!             ▼                            ▼
//!      ┌────────────┐              ┌──────────────┐
//!      │ Ingestion  │              │    Search    │
//!      │   Router   │              │  Aggregator  │
//!      └─────┬──────┘              └──────┬───────┘
//!            │  classify → group          │  fan out → merge
//!            ▼                            ▼
//!   ┌─────────────────┐          ┌─────────────────┐
//!   │ Embedder (cache │          │  VectorStore    │
//!   │  + retry)       │          │  Adapter        │
//!   └─────────────────┘          └────────┬────────┘
//!                                         │
//!                     rag_DOCUMENTS  rag_CODE  rag_MEDIA
//! ```
//!
//! This crate is a library: the enclosing service owns HTTP handling,
//! request validation, and authentication, and calls in through
//! [`ingest::IngestionRouter`] and [`search::SearchAggregator`]. Durable
//! state lives behind the boundary traits ([`store::VectorStoreClient`],
//! [`embedding::EmbeddingProvider`], [`embedding::EmbeddingCacheStore`],
//! [`sources::SourceConfigStore`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vector_mux::config::RouterConfig;
//! use vector_mux::embedding::{Embedder, InMemoryEmbeddingCache, OpenAiProvider};
//! use vector_mux::ingest::IngestionRouter;
//! use vector_mux::registry::CollectionRegistry;
//! use vector_mux::retry::RetryPolicy;
//! use vector_mux::sources::StaticSourceConfigStore;
//! use vector_mux::store::{InMemoryVectorStore, VectorStoreAdapter};
//!
//! # fn main() -> vector_mux::Result<()> {
//! let config = RouterConfig::default();
//! let registry = Arc::new(CollectionRegistry::from_config(&config));
//! let embedder = Arc::new(Embedder::new(
//!     Arc::new(OpenAiProvider::new("sk-...")?),
//!     Arc::new(InMemoryEmbeddingCache::new()),
//!     RetryPolicy::from(&config.retry),
//! ));
//! let store = Arc::new(VectorStoreAdapter::new(
//!     Arc::new(InMemoryVectorStore::new()),
//!     Arc::clone(&registry),
//! ));
//! let router = IngestionRouter::new(
//!     registry,
//!     embedder,
//!     store,
//!     Arc::new(StaticSourceConfigStore::new()),
//!     config.classifier.clone(),
//!     Duration::from_secs(config.operation_timeout_secs),
//! );
//! # let _ = router;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`classifier`] | Media/code/documents heuristic |
//! | [`registry`] | Content type → collection resolution |
//! | [`embedding`] | Provider boundary, cache, retrying generator |
//! | [`store`] | Vector store boundary and dimension-checked adapter |
//! | [`sources`] | Per-source content-type opt-in |
//! | [`ingest`] | Ingestion routing with partial-failure reports |
//! | [`search`] | Concurrent fan-out search and re-ranking |
//! | [`retry`] | Jittered exponential backoff policy |
//! | [`error`] | Crate error type |

pub mod classifier;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod registry;
pub mod retry;
pub mod search;
pub mod sources;
pub mod store;

pub use error::{Error, Result};
pub use models::{Chunk, ContentType, IngestionReport, SearchResult};
pub use registry::{CollectionRegistry, CollectionSpec};
