// src/storage/store.rs

//! Durable, crash-safe snapshot persistence.
//!
//! Writes go to a temporary file in the same directory, are forced to
//! stable storage, and are then renamed over the target — a concurrent
//! reader sees either the old file or the new one, never a partial write.
//! A snapshot file that no longer parses is copied aside under a
//! timestamped quarantine name before an empty snapshot takes its place,
//! so corrupted state stays inspectable.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;

/// Filesystem-backed store for the monitor snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store for the given snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot.
    ///
    /// A missing file yields an empty snapshot. A file that exists but
    /// fails to parse is quarantined and an empty snapshot is returned;
    /// the run continues.
    pub async fn load(&self) -> Result<Snapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "Snapshot file not found, starting empty: {}",
                    self.path.display()
                );
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => {
                log::info!(
                    "Snapshot loaded: {} documents in {} categories",
                    snapshot.total_documents(),
                    snapshot.category_count()
                );
                Ok(snapshot)
            }
            Err(e) => {
                let quarantine = self.quarantine().await?;
                log::warn!(
                    "Snapshot parse failed ({}), corrupted file kept at {}. Starting empty.",
                    e,
                    quarantine.display()
                );
                Ok(Snapshot::default())
            }
        }
    }

    /// Persist the snapshot atomically.
    ///
    /// On any failure the temporary file is removed and the previously
    /// persisted snapshot is left untouched; the error carries the target
    /// path and the underlying cause.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_atomic(&bytes)
            .await
            .map_err(|e| AppError::persist(&self.path, e))?;

        log::info!(
            "Snapshot saved: {} documents in {} categories -> {}",
            snapshot.total_documents(),
            snapshot.category_count(),
            self.path.display()
        );
        Ok(())
    }

    async fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Same directory as the target, so the rename stays on one filesystem.
        let tmp = self.path.with_extension("json.tmp");

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    /// Copy the unreadable snapshot aside under a unique timestamped name.
    async fn quarantine(&self) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("{}.corrupted.{}", self.path.display(), stamp);

        let mut candidate = PathBuf::from(&base);
        let mut counter = 1u32;
        while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            candidate = PathBuf::from(format!("{base}.{counter}"));
            counter += 1;
        }

        tokio::fs::copy(&self.path, &candidate).await?;
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.last_check = Some("2026-08-07T02:15:00Z".parse().unwrap());
        snapshot.set_documents(
            "13",
            vec![Document {
                title: "大型飞机公共航空运输承运人运行合格审定规则".to_string(),
                url: "https://www.caac.gov.cn/XXGK/t20260115_1.html".to_string(),
                category: "民航规章".to_string(),
                category_id: "13".to_string(),
                doc_number: "CCAR-121-R8".to_string(),
                validity: "有效".to_string(),
                ..Document::default()
            }],
        );
        snapshot
    }

    #[tokio::test]
    async fn test_load_missing_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("documents.json"));

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.total_documents(), 0);
        assert!(snapshot.last_check.is_none());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("documents.json"));

        let snapshot = sample_snapshot();
        store.save(&snapshot).await.unwrap();

        let restored = store.load().await.unwrap();
        assert_eq!(restored, snapshot);
    }

    #[tokio::test]
    async fn test_saved_file_keeps_non_ascii_readable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = SnapshotStore::new(&path);

        store.save(&sample_snapshot()).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("民航规章"));
        assert!(!text.contains("\\u"));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("documents.json"));
        store.save(&sample_snapshot()).await.unwrap();

        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["documents.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_quarantined() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        tokio::fs::write(&path, b"{ not json !!!").await.unwrap();

        let store = SnapshotStore::new(&path);
        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.total_documents(), 0);

        let mut quarantined = Vec::new();
        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.contains(".corrupted.") {
                quarantined.push(entry.path());
            }
        }
        assert_eq!(quarantined.len(), 1);

        // Quarantine is a copy: original bytes preserved in both places.
        let saved = tokio::fs::read(&quarantined[0]).await.unwrap();
        assert_eq!(saved, b"{ not json !!!");
        assert!(tokio::fs::try_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeated_corruption_gets_distinct_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = SnapshotStore::new(&path);

        tokio::fs::write(&path, b"broken one").await.unwrap();
        store.load().await.unwrap();
        tokio::fs::write(&path, b"broken two").await.unwrap();
        store.load().await.unwrap();

        let mut count = 0;
        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.file_name().to_string_lossy().contains(".corrupted.") {
                count += 1;
            }
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_failed_save_reports_path_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        // Parent "dir" is actually a file, so directory creation fails.
        let blocker = tmp.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let store = SnapshotStore::new(blocker.join("documents.json"));

        let err = store.save(&sample_snapshot()).await.unwrap_err();
        match err {
            AppError::Persist { path, .. } => {
                assert!(path.ends_with("documents.json"));
            }
            other => panic!("expected Persist error, got {other:?}"),
        }
        // The blocking file is untouched.
        let bytes = tokio::fs::read(&blocker).await.unwrap();
        assert_eq!(bytes, b"x");
    }

    #[tokio::test]
    async fn test_save_replaces_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("documents.json");
        let store = SnapshotStore::new(&path);

        let mut first = sample_snapshot();
        store.save(&first).await.unwrap();

        first.set_documents(
            "14",
            vec![Document {
                title: "新文件".to_string(),
                url: "https://www.caac.gov.cn/new.html".to_string(),
                category_id: "14".to_string(),
                ..Document::default()
            }],
        );
        store.save(&first).await.unwrap();

        let restored = store.load().await.unwrap();
        assert_eq!(restored.category_count(), 2);
    }
}
