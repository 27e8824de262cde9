//! Local filesystem snapshot storage.
//!
//! The snapshot lives in a single JSON file. Writes go to a sibling `.tmp`
//! file that is flushed, synced and then renamed over the target, so a
//! crash mid-write leaves the previous snapshot untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{SnapshotFile, SnapshotStore, StoredSnapshot};

/// Local filesystem snapshot backend.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    path: PathBuf,
}

impl LocalSnapshotStore {
    /// Create a store writing to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn persistence_error(&self, e: impl std::fmt::Display) -> AppError {
        AppError::persistence(self.path.display().to_string(), e)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read and decode the stored document.
    async fn read_stored(&self) -> Result<Option<StoredSnapshot>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn load(&self) -> Snapshot {
        match self.read_stored().await {
            Ok(Some(stored)) => {
                let (snapshot, _) = stored.into_parts();
                log::debug!(
                    "Loaded snapshot with {} pages from {}",
                    snapshot.len(),
                    self.path.display()
                );
                snapshot
            }
            Ok(None) => {
                log::info!("No snapshot at {}, starting fresh", self.path.display());
                Snapshot::new()
            }
            Err(e) => {
                log::warn!(
                    "{}; treating snapshot as empty",
                    self.persistence_error(e)
                );
                Snapshot::new()
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&SnapshotFile::new(snapshot.clone()))?;

        if let Err(e) = self.write_bytes(&bytes).await {
            // Best effort; a stale temp file never shadows the real one.
            let _ = tokio::fs::remove_file(self.tmp_path()).await;
            return Err(self.persistence_error(e));
        }

        log::debug!(
            "Snapshot with {} pages written to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn last_updated(&self) -> Option<DateTime<Utc>> {
        match self.read_stored().await {
            Ok(Some(stored)) => stored.into_parts().1,
            _ => None,
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("https://example.com/a", "2026-03-01");
        snapshot.insert("https://example.com/b", "weekly_0.8_2026-03-14");
        snapshot
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = LocalSnapshotStore::new(tmp.path().join("state/snapshot.json"));

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await, sample());
        assert!(store.last_updated().await.is_some());
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalSnapshotStore::new(tmp.path().join("nope.json"));
        assert!(store.load().await.is_empty());
        assert!(store.last_updated().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snapshot.json");
        std::fs::write(&path, b"{\"pages\": {\"https://example.com/a\": ").unwrap();

        let store = LocalSnapshotStore::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_bare_map_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("last_articles.json");
        std::fs::write(&path, r#"{"https://example.com/a": "2026-03-01"}"#).unwrap();

        let store = LocalSnapshotStore::new(&path);
        let snapshot = store.load().await;
        assert_eq!(snapshot.fingerprint("https://example.com/a"), Some("2026-03-01"));
        assert!(store.last_updated().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = LocalSnapshotStore::new(tmp.path().join("snapshot.json"));
        store.save(&sample()).await.unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(store.tmp_path()).unwrap();

        let mut next = Snapshot::new();
        next.insert("https://example.com/c", "2026-03-15");
        let err = store.save(&next).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence { .. }));

        assert_eq!(store.load().await, sample());
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = LocalSnapshotStore::new(tmp.path().join("snapshot.json"));
        store.save(&sample()).await.unwrap();

        std::fs::write(store.tmp_path(), b"{ half written").unwrap();
        assert_eq!(store.load().await, sample());
    }
}
