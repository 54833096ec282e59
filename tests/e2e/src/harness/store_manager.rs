//! Test Store Manager
//!
//! Provides isolated JSON-file stores for testing:
//! - Temporary stores that are automatically cleaned up
//! - Pre-seeded namespaces with test data
//! - Namespace snapshots and restoration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hivemem_core::{EntryMetadata, JsonFileStore, MemoryEntry, MemoryStore};
use tempfile::TempDir;

use crate::mocks::noise_text;

/// Manager for test stores
///
/// Creates an isolated store for each test to prevent interference.
/// The backing directory is deleted when the manager is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestStoreManager::new_temp();
/// db.seed_entries("task", 10).await;
/// let service = MemoryService::new(db.store(), "task", config)?;
/// ```
pub struct TestStoreManager {
    store: Arc<JsonFileStore>,
    /// Kept alive to prevent premature deletion
    _temp_dir: Option<TempDir>,
    data_dir: PathBuf,
    snapshot: Option<(String, Vec<MemoryEntry>)>,
}

impl TestStoreManager {
    /// Create a store in a temporary directory
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("memory");
        let store =
            JsonFileStore::new(Some(data_dir.clone())).expect("Failed to create test store");

        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
            data_dir,
            snapshot: None,
        }
    }

    /// Create a store at a specific path (not deleted on drop)
    pub fn new_at_path(path: PathBuf) -> Self {
        let store = JsonFileStore::new(Some(path.clone())).expect("Failed to create test store");

        Self {
            store: Arc::new(store),
            _temp_dir: None,
            data_dir: path,
            snapshot: None,
        }
    }

    /// Shared handle to the store
    pub fn store(&self) -> Arc<JsonFileStore> {
        Arc::clone(&self.store)
    }

    /// Store directory
    pub fn path(&self) -> &Path {
        &self.data_dir
    }

    /// Number of entries in `namespace`
    pub async fn entry_count(&self, namespace: &str) -> usize {
        self.store.list(namespace).await.map(|e| e.len()).unwrap_or(0)
    }

    /// Keys in `namespace`, sorted
    pub async fn keys(&self, namespace: &str) -> Vec<String> {
        self.store
            .list(namespace)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.key)
            .collect()
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed `namespace` with `count` dissimilar entries, oldest first
    pub async fn seed_entries(&self, namespace: &str, count: usize) -> Vec<String> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut keys = Vec::with_capacity(count);

        for i in 0..count {
            let key = format!("{namespace}/seed-{i:04}");
            let metadata = EntryMetadata::at(now - (count - i) as i64);
            if self
                .store
                .store(namespace, &key, noise_text(i as u64, 32).into(), metadata)
                .await
                .is_ok()
            {
                keys.push(key);
            }
        }

        keys
    }

    /// Write prepared entries, each into its own namespace
    pub async fn seed_with(&self, entries: &[MemoryEntry]) {
        for entry in entries {
            self.store
                .store(&entry.namespace, &entry.key, entry.value.clone(), entry.metadata.clone())
                .await
                .expect("Failed to seed entry");
        }
    }

    // ========================================================================
    // SNAPSHOT/RESTORE
    // ========================================================================

    /// Take a snapshot of `namespace`
    pub async fn take_snapshot(&mut self, namespace: &str) {
        let entries = self.store.list(namespace).await.unwrap_or_default();
        self.snapshot = Some((namespace.to_string(), entries));
    }

    /// Replace the snapshotted namespace with its snapshot
    ///
    /// Keys and metadata are preserved exactly.
    pub async fn restore_snapshot(&mut self) -> bool {
        let Some((namespace, entries)) = self.snapshot.take() else {
            return false;
        };

        self.clear(&namespace).await;
        for entry in entries {
            let _ = self
                .store
                .store(&namespace, &entry.key, entry.value, entry.metadata)
                .await;
        }
        true
    }

    /// Check if a snapshot exists
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    // ========================================================================
    // CLEANUP
    // ========================================================================

    /// Remove every entry in `namespace`
    pub async fn clear(&self, namespace: &str) {
        for key in self.keys(namespace).await {
            let _ = self.store.delete(namespace, &key).await;
        }
    }

    /// Reopen the store from disk, dropping any in-process state
    pub fn reopen(&mut self) {
        self.store = Arc::new(
            JsonFileStore::new(Some(self.data_dir.clone())).expect("Failed to reopen store"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_store_creation() {
        let db = TestStoreManager::new_temp();
        assert_eq!(db.entry_count("task").await, 0);
        assert!(db.path().exists());
    }

    #[tokio::test]
    async fn test_seed_entries() {
        let db = TestStoreManager::new_temp();
        let keys = db.seed_entries("task", 10).await;

        assert_eq!(keys.len(), 10);
        assert_eq!(db.entry_count("task").await, 10);
    }

    #[tokio::test]
    async fn test_clear_namespace() {
        let db = TestStoreManager::new_temp();
        db.seed_entries("task", 5).await;
        db.seed_entries("context", 2).await;

        db.clear("task").await;
        assert_eq!(db.entry_count("task").await, 0);
        assert_eq!(db.entry_count("context").await, 2);
    }

    #[tokio::test]
    async fn test_snapshot_restore_preserves_keys() {
        let mut db = TestStoreManager::new_temp();
        let keys = db.seed_entries("task", 5).await;

        db.take_snapshot("task").await;
        assert!(db.has_snapshot());

        db.clear("task").await;
        assert_eq!(db.entry_count("task").await, 0);

        assert!(db.restore_snapshot().await);
        assert_eq!(db.keys("task").await, keys);
    }

    #[tokio::test]
    async fn test_reopen_reads_from_disk() {
        let mut db = TestStoreManager::new_temp();
        db.seed_entries("knowledge", 3).await;
        db.reopen();
        assert_eq!(db.entry_count("knowledge").await, 3);
    }
}
