//! Fault-Injecting Store
//!
//! Wraps an [`InMemoryStore`], counts every adapter call, and fails the
//! n-th call of a chosen operation with `StoreError::Unavailable`.

use std::collections::HashMap;
use std::sync::Mutex;

use hivemem_core::{
    EntryMetadata, InMemoryStore, MemoryEntry, MemoryStore, MemoryValue, StoreError,
};

/// Adapter operation, for counting and fault targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Retrieve,
    Delete,
    Store,
}

/// In-memory store with call accounting and scripted failures
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    calls: Mutex<HashMap<StoreOp, usize>>,
    // op -> 1-based call number that fails
    faults: Mutex<HashMap<StoreOp, usize>>,
}

impl FaultyStore {
    /// Create an empty store with no faults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = MemoryEntry>) -> Self {
        Self {
            inner: InMemoryStore::with_entries(entries),
            ..Self::default()
        }
    }

    /// Fail the `nth` (1-based) future call of `op`, counted from now
    pub fn fail_on(&self, op: StoreOp, nth: usize) {
        let already = self.calls(op);
        self.faults
            .lock()
            .expect("fault table poisoned")
            .insert(op, already + nth);
    }

    /// Remove all scripted faults
    pub fn heal(&self) {
        self.faults.lock().expect("fault table poisoned").clear();
    }

    /// Calls made to `op` so far
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls
            .lock()
            .expect("call table poisoned")
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Calls made to every operation so far
    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("call table poisoned").values().sum()
    }

    /// Zero all call counters
    pub fn reset_calls(&self) {
        self.calls.lock().expect("call table poisoned").clear();
    }

    /// Underlying store, bypassing accounting and faults
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        let count = {
            let mut calls = self.calls.lock().expect("call table poisoned");
            let count = calls.entry(op).or_insert(0);
            *count += 1;
            *count
        };

        let faults = self.faults.lock().expect("fault table poisoned");
        if faults.get(&op) == Some(&count) {
            return Err(StoreError::Unavailable(format!(
                "injected {op:?} failure on call {count}"
            )));
        }
        Ok(())
    }
}

impl MemoryStore for FaultyStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        self.check(StoreOp::List)?;
        self.inner.list(namespace).await
    }

    async fn retrieve(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<MemoryEntry>, StoreError> {
        self.check(StoreOp::Retrieve)?;
        self.inner.retrieve(namespace, key).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        self.check(StoreOp::Delete)?;
        self.inner.delete(namespace, key).await
    }

    async fn store(
        &self,
        namespace: &str,
        key: &str,
        value: MemoryValue,
        metadata: EntryMetadata,
    ) -> Result<bool, StoreError> {
        self.check(StoreOp::Store)?;
        self.inner.store(namespace, key, value, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_calls() {
        let store = FaultyStore::new();
        store.list("ns").await.unwrap();
        store.list("ns").await.unwrap();
        store.delete("ns", "k").await.unwrap();

        assert_eq!(store.calls(StoreOp::List), 2);
        assert_eq!(store.calls(StoreOp::Delete), 1);
        assert_eq!(store.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_fails_nth_call_only() {
        let store = FaultyStore::new();
        store.fail_on(StoreOp::Store, 2);

        assert!(store.store("ns", "a", "x".into(), EntryMetadata::now()).await.is_ok());
        let err = store.store("ns", "b", "y".into(), EntryMetadata::now()).await;
        assert!(matches!(err, Err(StoreError::Unavailable(_))));
        assert!(store.store("ns", "c", "z".into(), EntryMetadata::now()).await.is_ok());
        assert_eq!(store.inner().len("ns").await, 2);
    }
}
