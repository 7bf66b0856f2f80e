//! Storage backends for the state store.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;

use atrium_core::StateError;

/// Durable key/value surface the state store persists into.
///
/// Backends only move bytes; key namespacing and serialization live in
/// [`super::StateStore`].
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Store bytes under `key`, overwriting any prior value.
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StateError>;

    /// Load the bytes stored under `key`, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StateError>;

    /// Whether `key` currently holds a value.
    async fn exists(&self, key: &str) -> Result<bool, StateError>;
}

fn backend_err(e: io::Error) -> StateError {
    StateError::Backend(e.to_string())
}

/// File-based storage backend: one file per key under a base directory.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create a file storage backend rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StateError> {
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(backend_err)?;
        }

        // Write to a temporary file and rename so a concurrent load never
        // observes a partially-written value.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await.map_err(backend_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(backend_err)?;

        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StateError> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(backend_err(e)),
        }
    }
}

/// In-memory storage backend, for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StateError> {
        self.entries.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StateError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StateError> {
        Ok(self.entries.contains_key(key))
    }
}
