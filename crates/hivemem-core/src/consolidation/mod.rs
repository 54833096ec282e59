//! Memory Consolidation Module
//!
//! Keeps a namespaced memory store bounded and free of near-duplicates:
//! - Expire entries past their category TTL
//! - Collapse near-duplicate groups to one survivor
//! - Evict least-recently-written entries down to a size ceiling
//! - Report what happened for audit

mod config;
mod consolidator;
mod dedup;

pub use config::{
    ConfigError, ConsolidationConfig, DEFAULT_CONTEXT_TTL_MS, DEFAULT_DEDUP_THRESHOLD,
    DEFAULT_MAX_CACHE_SIZE, DEFAULT_TASK_TTL_MS,
};
pub use consolidator::{ConsolidationPlan, Consolidator, ConsolidatorStats};
pub use dedup::{
    DedupResult, DedupStats, Deduplicator, DuplicateGroup, EMBEDDING_CACHE_CAPACITY,
};

use crate::storage::StoreError;

/// Consolidation error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConsolidationError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Store adapter failed mid-run
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Consolidation result type
pub type Result<T> = std::result::Result<T, ConsolidationError>;
