//! JSON-file memory store
//!
//! One `<namespace>.json` document per namespace under a data directory.
//! Documents are rewritten whole on every mutation through a temp file and a
//! rename, so a crash never leaves a half-written namespace behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tokio::sync::Mutex;

use super::{MemoryStore, Result, StoreError};
use crate::memory::{EntryMetadata, MemoryEntry, MemoryValue};

type Document = BTreeMap<String, MemoryEntry>;

/// File-backed store, one JSON document per namespace
#[derive(Debug)]
pub struct JsonFileStore {
    data_dir: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `data_dir`
    ///
    /// With `None`, uses the platform data directory for `hivemem`.
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => Self::default_dir()?,
        };

        std::fs::create_dir_all(&data_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(&data_dir, perms);
        }

        tracing::debug!(path = %data_dir.display(), "Opened JSON memory store");
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Platform data directory used when no directory is given
    pub fn default_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "hivemem", "core").ok_or_else(|| {
            StoreError::Init("Could not determine project directories".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("memory"))
    }

    /// Root directory of this store
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf> {
        let valid = !namespace.is_empty()
            && !namespace.starts_with('.')
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.data_dir.join(format!("{namespace}.json")))
    }

    async fn load(&self, namespace: &str) -> Result<Document> {
        let path = self.namespace_path(namespace)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut document: Document = serde_json::from_slice(&bytes)?;
                // The file name is authoritative for the namespace
                for entry in document.values_mut() {
                    entry.namespace = namespace.to_string();
                }
                Ok(document)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, namespace: &str, document: &Document) -> Result<()> {
        let path = self.namespace_path(namespace)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

impl MemoryStore for JsonFileStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MemoryEntry>> {
        Ok(self.load(namespace).await?.into_values().collect())
    }

    async fn retrieve(&self, namespace: &str, key: &str) -> Result<Option<MemoryEntry>> {
        Ok(self.load(namespace).await?.remove(key))
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(namespace).await?;
        if document.remove(key).is_none() {
            return Ok(false);
        }
        self.save(namespace, &document).await?;
        Ok(true)
    }

    async fn store(
        &self,
        namespace: &str,
        key: &str,
        value: MemoryValue,
        metadata: EntryMetadata,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(namespace).await?;
        let entry = MemoryEntry {
            key: key.to_string(),
            value,
            namespace: namespace.to_string(),
            metadata,
        };
        let created = document.insert(key.to_string(), entry).is_none();
        self.save(namespace, &document).await?;
        Ok(created)
    }
}
