//! # Hivemem Core
//!
//! Memory consolidation engine for namespaced key/value agent memory. Keeps a
//! store bounded in size and free of near-duplicates while honouring
//! per-category retention:
//!
//! - **TTL Expiry**: per-category maximum age (`context`, `task`, `knowledge`, custom)
//! - **Similarity Deduplication**: hash-projection embeddings, cosine similarity,
//!   transitive grouping, newest entry survives
//! - **LRU Size Bounding**: evict least-recently-written entries down to a ceiling
//! - **Auditable Runs**: every run returns a report and records a status document
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hivemem_core::{ConsolidationConfig, InMemoryStore, MemoryService};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let service = MemoryService::new(store, "task", ConsolidationConfig::default())?;
//!
//! service.store_memory("task/build", "Compile the workspace", None).await?;
//! let report = service.run_consolidation().await?;
//! println!("processed {} evicted {}", report.processed, report.evicted);
//! ```
//!
//! Pure, store-free consolidation:
//!
//! ```rust
//! use hivemem_core::{ConsolidationConfig, Consolidator, MemoryEntry};
//!
//! let mut consolidator = Consolidator::new(ConsolidationConfig::default()).unwrap();
//! let report = consolidator.consolidate(vec![
//!     MemoryEntry::new("a", "Duplicate content here", "knowledge").with_timestamp(1),
//!     MemoryEntry::new("b", "Duplicate content here", "knowledge").with_timestamp(2),
//! ]);
//! assert_eq!(report.deduplicated, 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `json-store` (default): File-backed reference store

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod cache;
pub mod consolidation;
pub mod embeddings;
pub mod memory;
pub mod service;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Memory types
pub use memory::{ConsolidationReport, EntryMetadata, MemoryCategory, MemoryEntry, MemoryValue};

// Embeddings
pub use embeddings::{
    cosine_similarity, Embedding, EmbeddingProvider, HashEmbedder, DEFAULT_DIMENSIONS,
};

// LRU optimizer
pub use cache::{LruOptimizer, LruStats};

// Consolidation
pub use consolidation::{
    ConfigError, ConsolidationConfig, ConsolidationError, ConsolidationPlan, Consolidator,
    ConsolidatorStats, DedupResult, DedupStats, Deduplicator, DuplicateGroup,
};

// Storage layer
pub use storage::{InMemoryStore, MemoryStore, StoreError};

#[cfg(feature = "json-store")]
pub use storage::JsonFileStore;

// Service
pub use service::{
    status_key, ConsolidationStatus, MemoryService, RunStatus, COORDINATION_NAMESPACE,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ConsolidationConfig, ConsolidationError, ConsolidationReport, Consolidator,
        EntryMetadata, InMemoryStore, MemoryCategory, MemoryEntry, MemoryService, MemoryStore,
        MemoryValue, StoreError,
    };

    #[cfg(feature = "json-store")]
    pub use crate::JsonFileStore;
}
