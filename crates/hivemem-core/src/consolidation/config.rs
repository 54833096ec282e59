//! Consolidation Configuration
//!
//! Retention policy for a consolidation run: size ceiling, similarity
//! threshold, per-category TTLs, and the optional archive namespace.
//! Deserializes from camelCase JSON; every field has a default.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::embeddings::DEFAULT_DIMENSIONS;
use crate::memory::MemoryCategory;

/// Default ceiling on entries kept after consolidation
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;

/// Default cosine similarity at which two entries count as duplicates
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;

/// Default TTL for `context` entries (1 hour)
pub const DEFAULT_CONTEXT_TTL_MS: u64 = 60 * 60 * 1000;

/// Default TTL for `task` entries (24 hours)
pub const DEFAULT_TASK_TTL_MS: u64 = 24 * 60 * 60 * 1000;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Invalid configuration or argument, rejected up front
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Similarity threshold outside `[0, 1]`
    #[error("Deduplication threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
    /// Pressure threshold outside `[0, 1]`
    #[error("Pressure threshold must be within [0, 1], got {0}")]
    InvalidPressureThreshold(f64),
    /// Cache capacity of zero
    #[error("Cache capacity must be at least 1")]
    ZeroCapacity,
    /// Embedding dimension of zero
    #[error("Embedding dimensions must be at least 1")]
    ZeroDimensions,
    /// Empty cache key
    #[error("Cache key cannot be empty")]
    EmptyKey,
    /// Malformed TTL table entry
    #[error("Invalid TTL for category '{0}'")]
    InvalidTtl(String),
    /// Archive target that would lose or clobber entries
    #[error("Invalid archive namespace '{0}'")]
    InvalidArchiveNamespace(String),
}

/// Validate a similarity threshold
pub(crate) fn check_threshold(threshold: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::InvalidThreshold(threshold))
    }
}

// ============================================================================
// CONSOLIDATION CONFIG
// ============================================================================

/// Configuration for a memory consolidator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsolidationConfig {
    /// Entry ceiling enforced by size-bound eviction
    pub max_cache_size: usize,
    /// Cosine similarity at or above which entries are duplicates
    pub deduplication_threshold: f32,
    /// Maximum age in milliseconds per category name; `None` never expires
    pub ttl: BTreeMap<String, Option<u64>>,
    /// TTL for categories missing from `ttl`; `None` never expires
    pub default_ttl: Option<u64>,
    /// Value compression toggle (values are passed through unchanged)
    pub compression_enabled: bool,
    /// Namespace that receives removed entries instead of dropping them
    pub archive_namespace: Option<String>,
    /// Output dimension of the hash embedder
    pub embedding_dimensions: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        let mut ttl = BTreeMap::new();
        ttl.insert("context".to_string(), Some(DEFAULT_CONTEXT_TTL_MS));
        ttl.insert("task".to_string(), Some(DEFAULT_TASK_TTL_MS));
        ttl.insert("knowledge".to_string(), None);

        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            deduplication_threshold: DEFAULT_DEDUP_THRESHOLD,
            ttl,
            default_ttl: None,
            compression_enabled: false,
            archive_namespace: None,
            embedding_dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

impl ConsolidationConfig {
    /// Set the TTL for a category (builder style)
    pub fn with_ttl(mut self, category: impl Into<String>, ttl_ms: Option<u64>) -> Self {
        self.ttl.insert(category.into().to_lowercase(), ttl_ms);
        self
    }

    /// Set the entry ceiling (builder style)
    pub fn with_max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = max_cache_size;
        self
    }

    /// Set the similarity threshold (builder style)
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.deduplication_threshold = threshold;
        self
    }

    /// Route removed entries into `namespace` (builder style)
    pub fn with_archive_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.archive_namespace = Some(namespace.into());
        self
    }

    /// Check every field, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold(self.deduplication_threshold)?;
        if self.embedding_dimensions == 0 {
            return Err(ConfigError::ZeroDimensions);
        }
        let mut seen = HashSet::new();
        for name in self.ttl.keys() {
            let normalized = name.trim().to_lowercase();
            if normalized.is_empty() {
                return Err(ConfigError::InvalidTtl(name.clone()));
            }
            // Lookups are case-insensitive, so "Context" and "context" collide
            if !seen.insert(normalized.clone()) {
                return Err(ConfigError::InvalidTtl(normalized));
            }
        }
        if let Some(archive) = &self.archive_namespace {
            if archive.trim().is_empty() {
                return Err(ConfigError::InvalidArchiveNamespace(archive.clone()));
            }
        }
        Ok(())
    }

    /// TTL that applies to `category`
    ///
    /// Unmapped or unresolved categories fall back to `default_ttl`.
    pub fn ttl_for(&self, category: Option<&MemoryCategory>) -> Option<u64> {
        match category {
            Some(category) => match self.ttl.get(category.as_str()) {
                Some(ttl) => *ttl,
                None => self.default_ttl,
            },
            None => self.default_ttl,
        }
    }
}
