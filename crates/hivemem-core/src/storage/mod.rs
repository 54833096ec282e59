//! Storage Module
//!
//! Narrow adapter over a namespaced key/value memory store:
//! - `MemoryStore` trait consumed by the memory service
//! - In-memory reference store for tests and embedding
//! - JSON-file reference store (one document per namespace)

mod memory;

#[cfg(feature = "json-store")]
mod json_file;

use std::future::Future;

pub use memory::InMemoryStore;

#[cfg(feature = "json-store")]
pub use json_file::JsonFileStore;

use crate::memory::{EntryMetadata, MemoryEntry, MemoryValue};

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend cannot serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Namespace name the backend cannot represent
    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Namespaced key/value memory store
///
/// Keys are unique per namespace. The store is the source of truth; callers
/// work on snapshots returned by [`list`](Self::list).
pub trait MemoryStore: Send + Sync {
    /// Every entry in `namespace`, in key order
    fn list(&self, namespace: &str) -> impl Future<Output = Result<Vec<MemoryEntry>>> + Send;

    /// One entry, if present
    fn retrieve(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<MemoryEntry>>> + Send;

    /// Remove `key`; `Ok(false)` when it was already absent
    fn delete(&self, namespace: &str, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Insert or overwrite `key`; `Ok(true)` when the key was newly created
    fn store(
        &self,
        namespace: &str,
        key: &str,
        value: MemoryValue,
        metadata: EntryMetadata,
    ) -> impl Future<Output = Result<bool>> + Send;
}
