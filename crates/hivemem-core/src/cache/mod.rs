//! Cache Module
//!
//! Bounded recency-tracking cache used for size-bound eviction:
//! - LRU ordering with automatic overflow eviction
//! - Memory pressure detection
//! - Explicit shrink-to-target with audit trail of evicted keys

mod optimizer;

pub use optimizer::{LruOptimizer, LruStats};
