//! Collection registry: content type → embedding model, dimension, and
//! collection name.
//!
//! The registry is built once from a validated [`RouterConfig`] and is
//! read-only afterwards, so concurrent readers never race with a writer.
//! [`collection_name`] is pure and total: the write and read paths both
//! go through it and therefore always compute byte-identical names.

use crate::config::{CollectionConfig, RouterConfig};
use crate::models::ContentType;

/// Per-type vector collection configuration, resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub content_type: ContentType,
    /// Embedding model used for every chunk routed to this collection.
    pub model: String,
    /// Vector dimension; fixed once the collection is created.
    pub dims: usize,
    /// Deterministic function of the content type (prefix + upper-cased
    /// type name).
    pub collection_name: String,
}

/// Immutable mapping from content type to [`CollectionSpec`].
///
/// Resolution cannot fail: [`ContentType`] is a closed enum, so an
/// unknown type is unrepresentable.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    specs: [CollectionSpec; 3],
}

impl CollectionRegistry {
    /// Build the registry from validated configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        let make = |content_type: ContentType, c: &CollectionConfig| CollectionSpec {
            content_type,
            model: c.model.clone(),
            dims: c.dims,
            collection_name: collection_name(&config.collection_prefix, content_type),
        };
        Self {
            specs: [
                make(ContentType::Documents, &config.collections.documents),
                make(ContentType::Code, &config.collections.code),
                make(ContentType::Media, &config.collections.media),
            ],
        }
    }

    /// Resolve the spec for a content type. Total: every variant maps.
    pub fn resolve(&self, content_type: ContentType) -> &CollectionSpec {
        match content_type {
            ContentType::Documents => &self.specs[0],
            ContentType::Code => &self.specs[1],
            ContentType::Media => &self.specs[2],
        }
    }

    /// Collection name for a content type.
    pub fn collection_name(&self, content_type: ContentType) -> &str {
        &self.resolve(content_type).collection_name
    }

    /// All specs, in canonical content-type order.
    pub fn specs(&self) -> impl Iterator<Item = &CollectionSpec> {
        self.specs.iter()
    }
}

/// Compute a collection name: fixed prefix + upper-cased type name.
pub fn collection_name(prefix: &str, content_type: ContentType) -> String {
    format!("{}{}", prefix, content_type.as_str().to_uppercase())
}
