//! Memory Service
//!
//! Binds a consolidator to one namespace of a [`MemoryStore`]. A run takes a
//! snapshot of the namespace, plans it, archives and deletes what the plan
//! removes, then records a status document under the `coordination`
//! namespace so other agents can verify the run happened.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::consolidation::{
    ConfigError, ConsolidationConfig, ConsolidationError, Consolidator, ConsolidatorStats, Result,
};
use crate::memory::{ConsolidationReport, EntryMetadata, MemoryEntry, MemoryValue};
use crate::storage::{MemoryStore, StoreError};

/// Namespace holding consolidation status records
pub const COORDINATION_NAMESPACE: &str = "coordination";

/// Key of the status record for `namespace`
pub fn status_key(namespace: &str) -> String {
    format!("consolidation/{namespace}")
}

// ============================================================================
// STATUS RECORD
// ============================================================================

/// Outcome of a recorded consolidation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Plan applied and status written
    Completed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Status record written after each applied run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationStatus {
    /// Unique id of the last run
    pub run_id: Uuid,
    /// Run outcome
    pub status: RunStatus,
    /// Namespace the run consolidated
    pub namespace: String,
    /// Runs recorded for this namespace, across service instances
    pub consolidation_count: u64,
    /// When the last run finished
    pub last_run_at: DateTime<Utc>,
    /// Report of the last run
    pub last_report: ConsolidationReport,
}

impl ConsolidationStatus {
    fn from_entry(entry: &MemoryEntry) -> std::result::Result<Self, StoreError> {
        let status = match &entry.value {
            MemoryValue::Text(text) => serde_json::from_str(text)?,
            MemoryValue::Structured(value) => serde_json::from_value(value.clone())?,
        };
        Ok(status)
    }
}

// ============================================================================
// MEMORY SERVICE
// ============================================================================

/// Namespace-scoped memory operations plus consolidation
pub struct MemoryService<S: MemoryStore> {
    store: Arc<S>,
    namespace: String,
    consolidator: Mutex<Consolidator>,
}

impl<S: MemoryStore> MemoryService<S> {
    /// Create a service for `namespace` with the given policy
    ///
    /// The archive namespace, if any, must differ from `namespace` and from
    /// [`COORDINATION_NAMESPACE`]: archiving into the source would delete the
    /// copy right after writing it.
    pub fn new(
        store: Arc<S>,
        namespace: impl Into<String>,
        config: ConsolidationConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let namespace = namespace.into();
        if let Some(archive) = &config.archive_namespace {
            if archive == &namespace || archive == COORDINATION_NAMESPACE {
                return Err(ConfigError::InvalidArchiveNamespace(archive.clone()));
            }
        }
        Ok(Self {
            store,
            namespace,
            consolidator: Mutex::new(Consolidator::new(config)?),
        })
    }

    /// Namespace this service manages
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store a value; `Ok(true)` when the key was newly created
    ///
    /// Metadata without a timestamp is stamped with the current time.
    pub async fn store_memory(
        &self,
        key: &str,
        value: impl Into<MemoryValue>,
        metadata: Option<EntryMetadata>,
    ) -> Result<bool> {
        let mut metadata = metadata.unwrap_or_default();
        if metadata.timestamp.is_none() {
            metadata.set_timestamp(Utc::now().timestamp_millis());
        }
        Ok(self
            .store
            .store(&self.namespace, key, value.into(), metadata)
            .await?)
    }

    /// Fetch one entry
    pub async fn retrieve_memory(&self, key: &str) -> Result<Option<MemoryEntry>> {
        Ok(self.store.retrieve(&self.namespace, key).await?)
    }

    /// Fetch every entry in the namespace
    pub async fn retrieve_all_memories(&self) -> Result<Vec<MemoryEntry>> {
        Ok(self.store.list(&self.namespace).await?)
    }

    /// Delete one entry; `Ok(false)` when it was already absent
    pub async fn delete_memory(&self, key: &str) -> Result<bool> {
        Ok(self.store.delete(&self.namespace, key).await?)
    }

    /// Consolidate the namespace and apply the result to the store
    ///
    /// Runs on one service are serialized. An empty namespace makes no store
    /// calls beyond the initial listing and writes no status. Any store
    /// failure aborts the run; entries already archived or deleted stay that
    /// way, and the run is left out of [`stats`](Self::stats).
    pub async fn run_consolidation(&self) -> Result<ConsolidationReport> {
        let mut consolidator = self.consolidator.lock().await;

        let snapshot = self.store.list(&self.namespace).await?;
        if snapshot.is_empty() {
            tracing::debug!(namespace = %self.namespace, "Nothing to consolidate");
            return Ok(consolidator.plan(snapshot).report);
        }

        let plan = consolidator.prepare(snapshot);
        let now = Utc::now();

        if let Some(archive_namespace) = &plan.archive_namespace {
            for entry in plan.to_archive() {
                let mut metadata = entry.metadata.clone();
                metadata.extra.insert(
                    "archivedFrom".to_string(),
                    serde_json::Value::String(self.namespace.clone()),
                );
                metadata.extra.insert(
                    "archivedAt".to_string(),
                    serde_json::Value::from(now.timestamp_millis()),
                );
                self.store
                    .store(archive_namespace, &entry.key, entry.value.clone(), metadata)
                    .await?;
            }
        }

        for entry in plan.removed() {
            if !self.store.delete(&self.namespace, &entry.key).await? {
                tracing::debug!(
                    namespace = %self.namespace,
                    key = %entry.key,
                    "Planned delete found nothing; entry was already gone"
                );
            }
        }

        let previous_count = match self.read_status().await {
            Ok(Some(status)) => status.consolidation_count,
            Ok(None) => 0,
            Err(ConsolidationError::Store(StoreError::Serialization(e))) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    "Ignoring unreadable status record: {}",
                    e
                );
                0
            }
            Err(e) => return Err(e),
        };

        let status = ConsolidationStatus {
            run_id: Uuid::new_v4(),
            status: RunStatus::Completed,
            namespace: self.namespace.clone(),
            consolidation_count: previous_count + 1,
            last_run_at: now,
            last_report: plan.report,
        };
        let value = serde_json::to_value(&status).map_err(StoreError::from)?;
        self.store
            .store(
                COORDINATION_NAMESPACE,
                &status_key(&self.namespace),
                MemoryValue::Structured(value),
                EntryMetadata::at(now.timestamp_millis()),
            )
            .await?;

        consolidator.record(&plan.report);
        tracing::info!(
            namespace = %self.namespace,
            run_id = %status.run_id,
            count = status.consolidation_count,
            "Consolidation applied"
        );
        Ok(plan.report)
    }

    /// Last recorded run for this namespace, if any
    pub async fn verify_consolidation(&self) -> Result<Option<ConsolidationStatus>> {
        self.read_status().await
    }

    /// Cumulative stats of this service's consolidator
    pub async fn stats(&self) -> ConsolidatorStats {
        self.consolidator.lock().await.stats()
    }

    async fn read_status(&self) -> Result<Option<ConsolidationStatus>> {
        let entry = self
            .store
            .retrieve(COORDINATION_NAMESPACE, &status_key(&self.namespace))
            .await?;
        match entry {
            Some(entry) => Ok(Some(ConsolidationStatus::from_entry(&entry)?)),
            None => Ok(None),
        }
    }
}
