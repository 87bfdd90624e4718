// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local Store adapter.
//!
//! A key/value store of JSON documents. Writes always replace the whole
//! document for a key. Read failures are logged and treated as "absent";
//! write failures are logged and returned so callers can decide, but callers
//! never roll back in-memory state because of them.

use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Raw key/value persistence.
pub trait StorageBackend: Send + Sync {
    /// Read the raw document for a key, `None` if absent.
    fn read(&self, key: &str) -> BoxFuture<'_, Result<Option<String>>>;
    /// Replace the document for a key.
    fn write(&self, key: &str, value: String) -> BoxFuture<'_, Result<()>>;
    /// Remove the document for a key.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<()>>;
}

/// Typed access to the Local Store.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// File-backed store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileBackend::new(dir)))
    }

    /// Ephemeral store for tests and guest sessions that must not persist.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// Read a collection. Absent or corrupt collections read as empty.
    pub async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_record(key).await.unwrap_or_default()
    }

    /// Read a single document. Absent or corrupt documents read as `None`.
    pub async fn read_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::error!(key, error = %e, "Local read failed, treating as empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(key, error = %e, "Corrupt local document, treating as empty");
                None
            }
        }
    }

    /// Replace a collection.
    pub async fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        self.write_record(key, &items).await
    }

    /// Replace a single document.
    pub async fn write_record<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.write(key, raw).await.inspect_err(|e| {
            tracing::error!(key, error = %e, "Local write failed");
        })
    }

    /// Remove a document.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key).await.inspect_err(|e| {
            tracing::error!(key, error = %e, "Local remove failed");
        })
    }
}

/// One JSON file per key inside a data directory.
///
/// Files are written to a temp path and renamed into place, so a reader never
/// sees a partially written document.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => Ok(Some(raw)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))),
            }
        })
    }

    fn write(&self, key: &str, value: String) -> BoxFuture<'_, Result<()>> {
        let path = self.path_for(key);
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", self.dir.display(), e))
            })?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, value).await.map_err(|e| {
                AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
            })?;
            tokio::fs::rename(&tmp, &path).await.map_err(|e| {
                AppError::Storage(format!("Failed to replace {}: {}", path.display(), e))
            })
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<()>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AppError::Storage(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                ))),
            }
        })
    }
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryBackend {
    entries: dashmap::DashMap<String, String>,
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let value = self.entries.get(key).map(|v| v.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn write(&self, key: &str, value: String) -> BoxFuture<'_, Result<()>> {
        self.entries.insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<()>> {
        self.entries.remove(key);
        Box::pin(async { Ok(()) })
    }
}
