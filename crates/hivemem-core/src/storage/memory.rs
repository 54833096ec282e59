//! In-process memory store

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::{MemoryStore, Result};
use crate::memory::{EntryMetadata, MemoryEntry, MemoryValue};

type Namespaces = BTreeMap<String, BTreeMap<String, MemoryEntry>>;

/// Volatile store keeping every namespace in a `BTreeMap`
#[derive(Debug, Default)]
pub struct InMemoryStore {
    namespaces: RwLock<Namespaces>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with entries, each landing in its own namespace
    pub fn with_entries(entries: impl IntoIterator<Item = MemoryEntry>) -> Self {
        let mut namespaces = Namespaces::new();
        for entry in entries {
            namespaces
                .entry(entry.namespace.clone())
                .or_default()
                .insert(entry.key.clone(), entry);
        }
        Self {
            namespaces: RwLock::new(namespaces),
        }
    }

    /// Number of entries in `namespace`
    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, BTreeMap::len)
    }

    /// Names of all non-empty namespaces
    pub async fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .read()
            .await
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl MemoryStore for InMemoryStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MemoryEntry>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn retrieve(&self, namespace: &str, key: &str) -> Result<Option<MemoryEntry>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    async fn store(
        &self,
        namespace: &str,
        key: &str,
        value: MemoryValue,
        metadata: EntryMetadata,
    ) -> Result<bool> {
        let entry = MemoryEntry {
            key: key.to_string(),
            value,
            namespace: namespace.to_string(),
            metadata,
        };
        let mut namespaces = self.namespaces.write().await;
        let previous = namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(previous.is_none())
    }
}
