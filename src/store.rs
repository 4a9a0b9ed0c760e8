use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StorageError;

/// Durable key/value sink for webhook records.
///
/// Keys are `/`-separated relative names such as `freshdesk/<request_id>`.
/// A `put` either stores the whole value or leaves nothing readable under the key,
/// and never replaces a value already stored.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

/// Storage key for a record: `<source>/<request_id>`.
pub fn record_key(source: &str, request_id: &str) -> String {
    format!("{source}/{request_id}")
}

/// Writes each key to `<root>/<key>.json` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Final on-disk location for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl StorageSink for FsSink {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;

        // Hidden sibling so the link stays on one filesystem.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        let written = match write_synced(&tmp, &bytes).await {
            Ok(()) => publish(&tmp, &path, key).await,
            Err(e) => Err(e),
        };
        discard(&tmp).await;

        written?;
        sync_dir(dir).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "record written");
        Ok(())
    }
}

/// Link `tmp` into place. Fails with `AlreadyExists` instead of replacing
/// an existing record.
async fn publish(tmp: &Path, path: &Path, key: &str) -> Result<(), StorageError> {
    match tokio::fs::hard_link(tmp, path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(StorageError::AlreadyExists(key.to_string()))
        }
        Err(e) => Err(StorageError::io(path, e)),
    }
}

async fn discard(tmp: &Path) {
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %tmp.display(), error = %e, "failed to remove temp file"),
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    let handle = tokio::fs::File::open(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;
    handle.sync_all().await.map_err(|e| StorageError::io(dir, e))
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(path, e))
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}
