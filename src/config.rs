//! TOML configuration parsing and validation.
//!
//! [`RouterConfig`] is constructed once at startup (from a file, a TOML
//! string, or [`Default`]) and injected into the registry and pipelines.
//! It is never read from ambient global state and never mutated after
//! validation.

use std::path::Path;

use serde::Deserialize;

use crate::classifier::ClassifierConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Fixed prefix for collection names; the full name is the prefix
    /// concatenated with the upper-cased content-type name.
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default)]
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Deadline for each external sub-operation (per-group write,
    /// per-collection query), in seconds.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            collection_prefix: default_collection_prefix(),
            collections: CollectionsConfig::default(),
            classifier: ClassifierConfig::default(),
            retry: RetryConfig::default(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

fn default_collection_prefix() -> String {
    "rag_".to_string()
}
fn default_operation_timeout_secs() -> u64 {
    30
}

/// Per-content-type embedding model and dimension table.
///
/// The same table serves the write path (which model to embed a group
/// with, which dimension to create the collection at) and the read path
/// (which collections exist, how to name them), so it lives in one place.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionsConfig {
    #[serde(default = "default_documents_collection")]
    pub documents: CollectionConfig,
    #[serde(default = "default_code_collection")]
    pub code: CollectionConfig,
    #[serde(default = "default_media_collection")]
    pub media: CollectionConfig,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            documents: default_documents_collection(),
            code: default_code_collection(),
            media: default_media_collection(),
        }
    }
}

/// Embedding model name and vector dimension for one collection.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    pub model: String,
    pub dims: usize,
}

fn default_documents_collection() -> CollectionConfig {
    CollectionConfig {
        model: "text-embedding-3-small".to_string(),
        dims: 1536,
    }
}
fn default_code_collection() -> CollectionConfig {
    CollectionConfig {
        model: "text-embedding-3-large".to_string(),
        dims: 3072,
    }
}
fn default_media_collection() -> CollectionConfig {
    CollectionConfig {
        model: "clip-vit-base-patch32".to_string(),
        dims: 512,
    }
}

/// Retry/backoff settings for the embedding provider boundary.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl RouterConfig {
    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RouterConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants. Called by the loaders; call it
    /// directly when building a config programmatically.
    pub fn validate(&self) -> Result<()> {
        if self.collection_prefix.is_empty() {
            return Err(Error::Config("collection_prefix must not be empty".into()));
        }
        for (name, c) in [
            ("documents", &self.collections.documents),
            ("code", &self.collections.code),
            ("media", &self.collections.media),
        ] {
            if c.dims == 0 {
                return Err(Error::Config(format!("collections.{name}.dims must be > 0")));
            }
            if c.model.is_empty() {
                return Err(Error::Config(format!(
                    "collections.{name}.model must not be empty"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.classifier.code_density_threshold) {
            return Err(Error::Config(
                "classifier.code_density_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be >= 1".into()));
        }
        if self.operation_timeout_secs == 0 {
            return Err(Error::Config("operation_timeout_secs must be >= 1".into()));
        }
        Ok(())
    }
}

/// Load and validate a config file from disk.
pub fn load_config(path: &Path) -> Result<RouterConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file {}: {e}", path.display())))?;
    RouterConfig::from_toml_str(&content)
}
