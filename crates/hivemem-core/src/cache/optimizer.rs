//! LRU Optimizer
//!
//! A bounded cache that tracks recency, reports memory pressure, and can be
//! shrunk on demand. Recency is strict access order: every `set` and every
//! `get` hit moves the key to the most-recently-used end, and eviction always
//! takes the least-recently-touched key first.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::consolidation::ConfigError;

/// Cache statistics snapshot
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LruStats {
    /// Live entries
    pub size: usize,
    /// Fixed capacity
    pub capacity: usize,
    /// Entries evicted by overflow or `optimize`
    pub evictions: u64,
    /// `get` calls that found the key
    pub hits: u64,
    /// `get` calls that missed
    pub misses: u64,
    /// `size / capacity`
    pub utilization: f64,
}

/// Bounded LRU cache with pressure detection and explicit eviction
pub struct LruOptimizer<V> {
    cache: LruCache<String, V>,
    evictions: u64,
    hits: u64,
    misses: u64,
}

impl<V> std::fmt::Debug for LruOptimizer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruOptimizer")
            .field("size", &self.cache.len())
            .field("capacity", &self.cache.cap())
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl<V> LruOptimizer<V> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self::with_capacity(capacity))
    }

    /// Create a cache from an already non-zero capacity
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            evictions: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Insert or overwrite `key`, marking it most recently used
    ///
    /// Returns the key evicted to make room, if the insertion overflowed the
    /// capacity. Overwriting an existing key never evicts.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: V,
    ) -> Result<Option<String>, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        Ok(self.push(key, value))
    }

    // Callers guarantee `key` is non-empty
    pub(crate) fn push(&mut self, key: String, value: V) -> Option<String> {
        match self.cache.push(key.clone(), value) {
            Some((old_key, _)) if old_key != key => {
                self.evictions += 1;
                tracing::trace!(evicted = %old_key, "LRU overflow eviction");
                Some(old_key)
            }
            _ => None,
        }
    }

    /// Look up `key`, promoting it to most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        match self.cache.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look up `key` without touching recency or hit counters
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.cache.peek(key)
    }

    /// Check membership without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    /// Remove `key` (external delete, not counted as an eviction)
    pub fn delete(&mut self, key: &str) -> Option<V> {
        self.cache.pop(key)
    }

    /// True when `size / capacity >= threshold`
    ///
    /// `threshold` must lie in `[0, 1]`; anything else (including NaN) is
    /// rejected rather than clamped.
    pub fn is_under_pressure(&self, threshold: f64) -> Result<bool, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidPressureThreshold(threshold));
        }
        Ok(self.utilization() >= threshold)
    }

    /// Evict least-recently-used entries until `size <= target_size`
    ///
    /// Returns the evicted keys, oldest first. Empty when already at or below
    /// the target.
    pub fn optimize(&mut self, target_size: usize) -> Vec<String> {
        self.drain_to(target_size)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Like [`optimize`](Self::optimize) but hands back the evicted values too
    pub fn drain_to(&mut self, target_size: usize) -> Vec<(String, V)> {
        let mut evicted = Vec::with_capacity(self.cache.len().saturating_sub(target_size));
        while self.cache.len() > target_size {
            match self.cache.pop_lru() {
                Some(pair) => evicted.push(pair),
                None => break,
            }
        }
        self.evictions += evicted.len() as u64;
        evicted
    }

    /// Remove everything without counting evictions
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Live entry count
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    fn utilization(&self) -> f64 {
        self.cache.len() as f64 / self.capacity() as f64
    }

    /// Statistics snapshot
    pub fn stats(&self) -> LruStats {
        LruStats {
            size: self.cache.len(),
            capacity: self.capacity(),
            evictions: self.evictions,
            hits: self.hits,
            misses: self.misses,
            utilization: self.utilization(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
