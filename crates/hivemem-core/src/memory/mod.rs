//! Memory module - Core types and data structures
//!
//! Implements the namespaced key/value memory model with:
//! - Memory entries with timestamp and category metadata
//! - Text or structured payloads behind one tagged union
//! - Retention categories that drive TTL expiry
//! - Consolidation reports for audit

mod entry;

pub use entry::{EntryMetadata, MemoryEntry, MemoryValue};

use serde::{Deserialize, Serialize};

// ============================================================================
// MEMORY CATEGORIES
// ============================================================================

/// Retention category of a memory entry
///
/// The category name is the lookup key into the consolidation TTL table.
/// `Knowledge` conventionally never expires; `Context` and `Task` are
/// short-lived working memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MemoryCategory {
    /// Conversational or session context
    Context,
    /// Task state, plans, in-flight work
    Task,
    /// Durable knowledge, patterns, decisions
    Knowledge,
    /// Any other category name
    Custom(String),
}

impl MemoryCategory {
    /// Category name as used in TTL tables
    pub fn as_str(&self) -> &str {
        match self {
            MemoryCategory::Context => "context",
            MemoryCategory::Task => "task",
            MemoryCategory::Knowledge => "knowledge",
            MemoryCategory::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Category name cannot be empty".to_string());
        }
        Ok(match trimmed.to_lowercase().as_str() {
            "context" => MemoryCategory::Context,
            "task" => MemoryCategory::Task,
            "knowledge" => MemoryCategory::Knowledge,
            other => MemoryCategory::Custom(other.to_string()),
        })
    }
}

impl TryFrom<String> for MemoryCategory {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MemoryCategory> for String {
    fn from(category: MemoryCategory) -> Self {
        category.as_str().to_string()
    }
}

// ============================================================================
// CONSOLIDATION REPORT
// ============================================================================

/// Result of one consolidation run
///
/// `evicted` combines TTL expiry and size-bound eviction. `archived` counts
/// removed entries that were routed to cold storage instead of being dropped,
/// so it overlaps `evicted` and `deduplicated` rather than adding to them.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    /// Entries in the input batch
    pub processed: usize,
    /// Entries removed by TTL expiry or size-bound eviction
    pub evicted: usize,
    /// Entries removed as near-duplicates of a newer survivor
    pub deduplicated: usize,
    /// Removed entries copied to the archive namespace
    pub archived: usize,
    /// Processing duration in milliseconds
    pub duration_ms: u64,
}

impl ConsolidationReport {
    /// Number of entries left after the run
    pub fn retained(&self) -> usize {
        self.processed
            .saturating_sub(self.evicted)
            .saturating_sub(self.deduplicated)
    }

    /// Whether the run removed anything
    pub fn is_noop(&self) -> bool {
        self.evicted == 0 && self.deduplicated == 0
    }
}
