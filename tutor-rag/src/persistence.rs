//! Blob stores for vector index snapshots.
//!
//! The index serializes itself into an opaque byte blob and hands it to a
//! [`SnapshotStore`] keyed by a location string. [`FileSnapshotStore`] treats
//! the location as a file path; [`InMemorySnapshotStore`] keeps blobs in a map
//! and is meant for tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RagError, Result};

/// A key-value blob store for index snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the blob stored at `location`, or `None` if nothing was saved there.
    async fn load(&self, location: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored at `location`.
    async fn save(&self, location: &str, bytes: &[u8]) -> Result<()>;
}

/// Distinguishes temp files of concurrent saves.
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

fn persistence_error(location: &str, message: impl Into<String>) -> RagError {
    RagError::PersistenceError { location: location.to_string(), message: message.into() }
}

/// Stores snapshots as files, writing to a sibling temp file and renaming it
/// into place so a crash mid-write never leaves a truncated snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSnapshotStore;

impl FileSnapshotStore {
    /// Create a file-backed store.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, location: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(location).await {
            Ok(bytes) => {
                debug!(location, bytes = bytes.len(), "read snapshot");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence_error(location, format!("read failed: {e}"))),
        }
    }

    async fn save(&self, location: &str, bytes: &[u8]) -> Result<()> {
        let path = Path::new(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_error(location, format!("create_dir_all failed: {e}")))?;
        }

        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = format!("{location}.{}.{seq}.tmp", std::process::id());
        let written = match tokio::fs::write(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, path)
                .await
                .map_err(|e| persistence_error(location, format!("rename failed: {e}"))),
            Err(e) => Err(persistence_error(location, format!("write failed: {e}"))),
        };
        if written.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        written?;

        debug!(location, bytes = bytes.len(), "wrote snapshot");
        Ok(())
    }
}

/// Keeps snapshots in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, location: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(location).cloned())
    }

    async fn save(&self, location: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.write().await.insert(location.to_string(), bytes.to_vec());
        Ok(())
    }
}
