//! Near-Duplicate Detection
//!
//! Groups memory entries whose embeddings are close in cosine similarity and
//! keeps one survivor per group.
//!
//! Grouping is transitive: pairs at or above the threshold are merged with a
//! union-find, so if A~B and B~C then A, B and C form one group even when A
//! and C alone fall below the threshold. Groups and their members are emitted
//! in input order, never in hash order.
//!
//! The scan is O(n²) over the batch. Consolidation runs on bounded batches, so
//! this is fine; large batches would want coarse bucketing of the embedding
//! before the pairwise pass.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::config::{check_threshold, ConfigError, DEFAULT_DEDUP_THRESHOLD};
use crate::embeddings::{cosine_similarity, Embedding, EmbeddingProvider, HashEmbedder};
use crate::memory::MemoryEntry;

/// Embeddings memoized per deduplicator instance
pub const EMBEDDING_CACHE_CAPACITY: usize = 1024;

const EMBEDDING_CACHE_SLOTS: NonZeroUsize = NonZeroUsize::new(EMBEDDING_CACHE_CAPACITY).unwrap();

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A set of mutually similar entries with one designated survivor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    /// Every member key, in input order
    pub keys: Vec<String>,
    /// The member that is kept
    pub survivor: String,
    /// Members marked for removal, in input order
    pub removed: Vec<String>,
    #[serde(skip)]
    members: Vec<usize>,
    #[serde(skip)]
    survivor_index: usize,
}

impl DuplicateGroup {
    /// Number of members
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Groups always hold at least two members
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `key` belongs to this group
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Outcome of deduplicating a batch
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    /// Survivors plus entries in no group, in input order
    pub unique: Vec<MemoryEntry>,
    /// Non-surviving group members, in input order
    pub removed: Vec<MemoryEntry>,
    /// Groups that were collapsed
    pub groups: Vec<DuplicateGroup>,
}

/// Cumulative deduplication statistics
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    /// Entries passed to `deduplicate`
    pub scanned: u64,
    /// Entries removed as duplicates
    pub duplicates_removed: u64,
    /// Duplicate groups found
    pub groups_found: u64,
}

// ============================================================================
// UNION-FIND
// ============================================================================

/// Simple union-find for clustering
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            Ordering::Less => self.parent[rx] = ry,
            Ordering::Greater => self.parent[ry] = rx,
            Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

// ============================================================================
// DEDUPLICATOR
// ============================================================================

/// Similarity-based deduplicator
pub struct Deduplicator<P: EmbeddingProvider = HashEmbedder> {
    provider: P,
    threshold: f32,
    embedding_cache: LruCache<String, Embedding>,
    stats: DedupStats,
}

impl Default for Deduplicator<HashEmbedder> {
    fn default() -> Self {
        Self::build(DEFAULT_DEDUP_THRESHOLD, HashEmbedder::default())
    }
}

impl Deduplicator<HashEmbedder> {
    /// Create a deduplicator using the hash embedder
    pub fn new(threshold: f32) -> Result<Self, ConfigError> {
        Self::with_provider(threshold, HashEmbedder::default())
    }
}

impl<P: EmbeddingProvider> Deduplicator<P> {
    /// Create a deduplicator with a custom embedding provider
    pub fn with_provider(threshold: f32, provider: P) -> Result<Self, ConfigError> {
        Ok(Self::build(check_threshold(threshold)?, provider))
    }

    fn build(threshold: f32, provider: P) -> Self {
        Self {
            provider,
            threshold,
            embedding_cache: LruCache::new(EMBEDDING_CACHE_SLOTS),
            stats: DedupStats::default(),
        }
    }

    /// Similarity threshold in use
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Embed `text`, reusing a memoized vector when available
    pub fn create_embedding(&mut self, text: &str) -> Embedding {
        if let Some(embedding) = self.embedding_cache.get(text) {
            return embedding.clone();
        }
        let embedding = self.provider.embed(text);
        self.embedding_cache.put(text.to_string(), embedding.clone());
        embedding
    }

    /// Cosine similarity of two embeddings (`0.0` if either has zero norm)
    pub fn cosine_similarity(&self, a: &Embedding, b: &Embedding) -> f32 {
        cosine_similarity(&a.vector, &b.vector)
    }

    /// Find groups of entries whose similarity closure reaches the threshold
    pub fn find_duplicates(&mut self, entries: &[MemoryEntry]) -> Vec<DuplicateGroup> {
        let n = entries.len();
        if n < 2 {
            return Vec::new();
        }

        let embeddings: Vec<Embedding> = entries
            .iter()
            .map(|entry| self.create_embedding(&entry.text()))
            .collect();

        let mut uf = UnionFind::new(n);
        let mut linked = vec![false; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = self.cosine_similarity(&embeddings[i], &embeddings[j]);
                if sim >= self.threshold {
                    uf.union(i, j);
                    linked[i] = true;
                    linked[j] = true;
                }
            }
        }

        // Bucket by root, remembering first-seen order of roots
        let mut order: Vec<usize> = Vec::new();
        let mut buckets: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in (0..n).filter(|&i| linked[i]) {
            let root = uf.find(i);
            let bucket = buckets.entry(root).or_default();
            if bucket.is_empty() {
                order.push(root);
            }
            bucket.push(i);
        }

        order
            .into_iter()
            .filter_map(|root| buckets.remove(&root))
            .filter(|members| members.len() > 1)
            .map(|members| build_group(entries, members))
            .collect()
    }

    /// Collapse each duplicate group to its survivor
    pub fn deduplicate(&mut self, entries: Vec<MemoryEntry>) -> DedupResult {
        let groups = self.find_duplicates(&entries);

        let mut is_removed = vec![false; entries.len()];
        for group in &groups {
            for &idx in &group.members {
                if idx != group.survivor_index {
                    is_removed[idx] = true;
                }
            }
        }

        let mut unique = Vec::with_capacity(entries.len());
        let mut removed = Vec::new();
        for (entry, drop) in entries.into_iter().zip(is_removed) {
            if drop {
                removed.push(entry);
            } else {
                unique.push(entry);
            }
        }

        self.stats.scanned += (unique.len() + removed.len()) as u64;
        self.stats.duplicates_removed += removed.len() as u64;
        self.stats.groups_found += groups.len() as u64;

        tracing::debug!(
            groups = groups.len(),
            removed = removed.len(),
            kept = unique.len(),
            "Deduplication pass complete"
        );

        DedupResult {
            unique,
            removed,
            groups,
        }
    }

    /// Cumulative statistics
    pub fn stats(&self) -> DedupStats {
        self.stats
    }
}

/// Pick the survivor: newest timestamp, then smallest key
///
/// Entries without a timestamp rank as oldest.
fn survivor_of(entries: &[MemoryEntry], members: &[usize]) -> usize {
    let mut best = members[0];
    for &idx in &members[1..] {
        let candidate = &entries[idx];
        let current = &entries[best];
        let by_time = candidate
            .timestamp()
            .unwrap_or(i64::MIN)
            .cmp(&current.timestamp().unwrap_or(i64::MIN));
        let wins = match by_time {
            Ordering::Greater => true,
            Ordering::Equal => candidate.key < current.key,
            Ordering::Less => false,
        };
        if wins {
            best = idx;
        }
    }
    best
}

fn build_group(entries: &[MemoryEntry], members: Vec<usize>) -> DuplicateGroup {
    let survivor_index = survivor_of(entries, &members);
    DuplicateGroup {
        keys: members.iter().map(|&i| entries[i].key.clone()).collect(),
        survivor: entries[survivor_index].key.clone(),
        removed: members
            .iter()
            .filter(|&&i| i != survivor_index)
            .map(|&i| entries[i].key.clone())
            .collect(),
        members,
        survivor_index,
    }
}

// ============================================================================
// TESTS
// ============================================================================
