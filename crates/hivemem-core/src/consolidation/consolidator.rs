//! Memory Consolidator
//!
//! Runs the three consolidation phases in a fixed order:
//!
//! 1. **Expire**: drop entries older than their category TTL
//! 2. **Deduplicate**: collapse near-duplicate groups to their newest member
//! 3. **Evict**: if still above `max_cache_size`, evict least-recently-written
//!    entries through an [`LruOptimizer`]
//!
//! Expiry runs first so dead entries are never compared for similarity, and
//! deduplication runs before eviction so the size bound only removes entries
//! that are not redundant.
//!
//! The consolidator is pure over its input: it decides what to keep and
//! reports it, and leaves applying the plan to a store to the caller.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConsolidationConfig};
use super::dedup::{Deduplicator, DedupStats, DuplicateGroup};
use crate::cache::LruOptimizer;
use crate::embeddings::{EmbeddingProvider, HashEmbedder};
use crate::memory::{ConsolidationReport, MemoryEntry};

// ============================================================================
// PLAN AND STATS
// ============================================================================

/// Everything decided by one consolidation run
#[derive(Debug, Clone, Default)]
pub struct ConsolidationPlan {
    /// Entries that survive, in input order
    pub kept: Vec<MemoryEntry>,
    /// Entries past their TTL
    pub expired: Vec<MemoryEntry>,
    /// Non-surviving members of duplicate groups
    pub duplicates: Vec<MemoryEntry>,
    /// Entries evicted to meet `max_cache_size`, oldest first
    pub size_evicted: Vec<MemoryEntry>,
    /// Duplicate groups that were collapsed
    pub groups: Vec<DuplicateGroup>,
    /// Namespace removed entries should be archived into, if any
    pub archive_namespace: Option<String>,
    /// Counts for audit
    pub report: ConsolidationReport,
}

impl ConsolidationPlan {
    /// Every entry the run removes: expired, then duplicates, then size-evicted
    pub fn removed(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.expired
            .iter()
            .chain(self.duplicates.iter())
            .chain(self.size_evicted.iter())
    }

    /// Entries to copy into the archive namespace before deletion
    pub fn to_archive(&self) -> Vec<&MemoryEntry> {
        if self.archive_namespace.is_some() {
            self.removed().collect()
        } else {
            Vec::new()
        }
    }
}

/// Cumulative consolidator statistics
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatorStats {
    /// Completed runs
    pub consolidations: u64,
    /// Entries seen across all runs
    pub memories_processed: u64,
    /// Entries evicted (expiry + size bound) across all runs
    pub total_evicted: u64,
    /// Entries deduplicated across all runs
    pub total_deduplicated: u64,
}

// ============================================================================
// CONSOLIDATOR
// ============================================================================

/// Three-phase memory consolidation engine
pub struct Consolidator<P: EmbeddingProvider = HashEmbedder> {
    config: ConsolidationConfig,
    deduplicator: Deduplicator<P>,
    stats: ConsolidatorStats,
}

impl Consolidator<HashEmbedder> {
    /// Create a consolidator using the hash embedder
    pub fn new(config: ConsolidationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let embedder = HashEmbedder::new(config.embedding_dimensions)?;
        Self::with_provider(config, embedder)
    }
}

impl<P: EmbeddingProvider> Consolidator<P> {
    /// Create a consolidator with a custom embedding provider
    pub fn with_provider(
        mut config: ConsolidationConfig,
        provider: P,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.ttl = std::mem::take(&mut config.ttl)
            .into_iter()
            .map(|(name, ttl)| (name.trim().to_lowercase(), ttl))
            .collect();

        let deduplicator = Deduplicator::with_provider(config.deduplication_threshold, provider)?;
        Ok(Self {
            config,
            deduplicator,
            stats: ConsolidatorStats::default(),
        })
    }

    /// Get current configuration
    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Cumulative run statistics
    pub fn stats(&self) -> ConsolidatorStats {
        self.stats
    }

    /// Cumulative deduplication statistics
    pub fn dedup_stats(&self) -> DedupStats {
        self.deduplicator.stats()
    }

    /// Consolidate against the wall clock and return the report
    pub fn consolidate(&mut self, entries: Vec<MemoryEntry>) -> ConsolidationReport {
        self.plan(entries).report
    }

    /// Consolidate as of `now_ms` (epoch milliseconds) and return the report
    pub fn consolidate_at(
        &mut self,
        entries: Vec<MemoryEntry>,
        now_ms: i64,
    ) -> ConsolidationReport {
        self.plan_at(entries, now_ms).report
    }

    /// Plan a run against the wall clock and count it in [`stats`](Self::stats)
    pub fn plan(&mut self, entries: Vec<MemoryEntry>) -> ConsolidationPlan {
        self.plan_at(entries, Utc::now().timestamp_millis())
    }

    /// Plan a run as of `now_ms` (epoch milliseconds) and count it
    pub fn plan_at(&mut self, entries: Vec<MemoryEntry>, now_ms: i64) -> ConsolidationPlan {
        let plan = self.prepare_at(entries, now_ms);
        self.record(&plan.report);
        plan
    }

    /// Plan a run against the wall clock without counting it
    pub fn prepare(&mut self, entries: Vec<MemoryEntry>) -> ConsolidationPlan {
        self.prepare_at(entries, Utc::now().timestamp_millis())
    }

    /// Count a run whose plan was applied
    ///
    /// Pairs with [`prepare`](Self::prepare) when the plan is applied to a
    /// store, so a run that fails halfway never reaches the stats.
    pub fn record(&mut self, report: &ConsolidationReport) {
        self.stats.consolidations += 1;
        self.stats.memories_processed += report.processed as u64;
        self.stats.total_evicted += report.evicted as u64;
        self.stats.total_deduplicated += report.deduplicated as u64;
    }

    /// Plan a run as of `now_ms` without counting it
    pub fn prepare_at(&mut self, entries: Vec<MemoryEntry>, now_ms: i64) -> ConsolidationPlan {
        let start = Instant::now();
        let processed = entries.len();

        if self.config.compression_enabled {
            tracing::debug!("Compression requested; values are passed through unchanged");
        }

        // Phase 1: expire
        let (live, expired) = self.expire(entries, now_ms);

        // Phase 2: deduplicate
        let dedup = self.deduplicator.deduplicate(live);

        // Phase 3: size-bound eviction
        let (kept, size_evicted) = self.evict_to_size(dedup.unique);

        let evicted = expired.len() + size_evicted.len();
        let deduplicated = dedup.removed.len();
        let archived = if self.config.archive_namespace.is_some() {
            evicted + deduplicated
        } else {
            0
        };

        let report = ConsolidationReport {
            processed,
            evicted,
            deduplicated,
            archived,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            processed,
            expired = expired.len(),
            deduplicated,
            size_evicted = size_evicted.len(),
            kept = kept.len(),
            archived,
            "Consolidation planned"
        );

        ConsolidationPlan {
            kept,
            expired,
            duplicates: dedup.removed,
            size_evicted,
            groups: dedup.groups,
            archive_namespace: self.config.archive_namespace.clone(),
            report,
        }
    }

    /// Whether `entry` is past its TTL at `now_ms`
    ///
    /// `age > ttl` expires; an entry exactly `ttl` old survives. A missing
    /// timestamp counts as age zero. Timestamps in the future count as age
    /// zero as well.
    pub fn is_expired(&self, entry: &MemoryEntry, now_ms: i64) -> bool {
        let Some(ttl) = self.config.ttl_for(entry.resolved_category().as_ref()) else {
            return false;
        };
        let age = match entry.timestamp() {
            Some(ts) => u64::try_from(now_ms.saturating_sub(ts)).unwrap_or(0),
            None => 0,
        };
        age > ttl
    }

    fn expire(
        &self,
        entries: Vec<MemoryEntry>,
        now_ms: i64,
    ) -> (Vec<MemoryEntry>, Vec<MemoryEntry>) {
        let mut live = Vec::with_capacity(entries.len());
        let mut expired = Vec::new();

        for entry in entries {
            if entry.timestamp().is_none() {
                tracing::warn!(
                    key = %entry.key,
                    namespace = %entry.namespace,
                    "Memory entry has no timestamp; treating it as fresh"
                );
            }
            if self.is_expired(&entry, now_ms) {
                expired.push(entry);
            } else {
                live.push(entry);
            }
        }

        tracing::debug!(expired = expired.len(), live = live.len(), "Expiry phase complete");
        (live, expired)
    }

    fn evict_to_size(&self, unique: Vec<MemoryEntry>) -> (Vec<MemoryEntry>, Vec<MemoryEntry>) {
        let target = self.config.max_cache_size;
        if unique.len() <= target {
            return (unique, Vec::new());
        }
        // len > target >= 0, so the batch is non-empty
        let capacity = NonZeroUsize::MIN.saturating_add(unique.len() - 1);

        // Oldest write = least recently used; missing timestamps rank oldest
        let mut order: Vec<usize> = (0..unique.len()).collect();
        order.sort_by(|&a, &b| {
            let (ea, eb) = (&unique[a], &unique[b]);
            ea.timestamp()
                .unwrap_or(i64::MIN)
                .cmp(&eb.timestamp().unwrap_or(i64::MIN))
                .then_with(|| ea.key.cmp(&eb.key))
        });

        // Index keys are unique and non-empty, and the optimizer holds the
        // whole batch, so nothing is evicted before `drain_to`
        let mut optimizer = LruOptimizer::with_capacity(capacity);
        for idx in order {
            optimizer.push(idx.to_string(), idx);
        }

        let evicted_order: Vec<usize> = optimizer
            .drain_to(target)
            .into_iter()
            .map(|(_, idx)| idx)
            .collect();
        let evicted_set: HashSet<usize> = evicted_order.iter().copied().collect();

        let mut slots: Vec<Option<MemoryEntry>> = unique.into_iter().map(Some).collect();
        let size_evicted: Vec<MemoryEntry> = evicted_order
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        let kept: Vec<MemoryEntry> = slots
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !evicted_set.contains(idx))
            .filter_map(|(_, slot)| slot)
            .collect();

        tracing::debug!(
            evicted = size_evicted.len(),
            kept = kept.len(),
            target,
            "Size-bound eviction complete"
        );
        (kept, size_evicted)
    }
}

// ============================================================================
// TESTS
// ============================================================================
