//! # Checkpoint Persistence
//!
//! Durability point of the orchestrator: the last confirmed checkpoint of
//! each operation is written here after every successful batch and read back
//! on resume. Writes replace the whole document, never merge.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tracing::{debug, instrument};

use crate::models::{OperationCheckpoint, OperationId};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last persisted checkpoint for the operation, if any
    async fn load(&self, operation_id: OperationId) -> anyhow::Result<Option<OperationCheckpoint>>;

    /// Atomically replace the stored checkpoint
    async fn save(&self, checkpoint: &OperationCheckpoint) -> anyhow::Result<()>;

    /// Remove the checkpoint, returning whether one existed
    async fn delete(&self, operation_id: OperationId) -> anyhow::Result<bool>;

    async fn list(&self) -> anyhow::Result<Vec<OperationId>>;
}

/// Process-local store, used by tests and single-node hosts
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: DashMap<OperationId, OperationCheckpoint>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, operation_id: OperationId) -> anyhow::Result<Option<OperationCheckpoint>> {
        Ok(self
            .checkpoints
            .get(&operation_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, checkpoint: &OperationCheckpoint) -> anyhow::Result<()> {
        self.checkpoints
            .insert(checkpoint.operation_id, checkpoint.clone());
        Ok(())
    }

    async fn delete(&self, operation_id: OperationId) -> anyhow::Result<bool> {
        Ok(self.checkpoints.remove(&operation_id).is_some())
    }

    async fn list(&self) -> anyhow::Result<Vec<OperationId>> {
        let mut ids: Vec<OperationId> = self.checkpoints.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

/// One JSON document per operation under a directory.
///
/// Saves go to a temporary sibling and are renamed over the target, so a
/// reader never observes a partially written checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    /// Open a store rooted at `directory`, creating it if needed
    pub async fn open(directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("creating checkpoint directory {}", directory.display()))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, operation_id: OperationId) -> PathBuf {
        self.directory.join(format!("{operation_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, operation_id: OperationId) -> anyhow::Result<Option<OperationCheckpoint>> {
        let path = self.path_for(operation_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("reading checkpoint {}", path.display()))
            }
        };

        let checkpoint = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding checkpoint {}", path.display()))?;
        Ok(Some(checkpoint))
    }

    #[instrument(skip(self, checkpoint), fields(operation_id = %checkpoint.operation_id))]
    async fn save(&self, checkpoint: &OperationCheckpoint) -> anyhow::Result<()> {
        let path = self.path_for(checkpoint.operation_id);
        let temp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoint)?;

        fs::write(&temp_path, &bytes)
            .await
            .with_context(|| format!("writing checkpoint {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("replacing checkpoint {}", path.display()))?;

        debug!(
            completed = ?checkpoint.completed(),
            path = %path.display(),
            "Checkpoint persisted"
        );
        Ok(())
    }

    async fn delete(&self, operation_id: OperationId) -> anyhow::Result<bool> {
        let path = self.path_for(operation_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error).with_context(|| format!("deleting checkpoint {}", path.display())),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<OperationId>> {
        let mut entries = fs::read_dir(&self.directory)
            .await
            .with_context(|| format!("listing {}", self.directory.display()))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // stray files that are not named by an operation id are skipped
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<OperationId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchingConfig;
    use crate::models::{OperationInput, WatermarkRange};
    use chrono::Utc;
    use uuid::Uuid;

    fn checkpoint() -> OperationCheckpoint {
        OperationCheckpoint::new(
            OperationId::from_uuid(Uuid::new_v4()),
            OperationInput::ContentLengthBackfill,
            BatchingConfig::default(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_save_overwrites() {
        let store = InMemoryCheckpointStore::new();
        let mut cp = checkpoint();
        store.save(&cp).await.unwrap();

        cp.advance_completed(WatermarkRange::new(1, 10).unwrap())
            .unwrap();
        store.save(&cp).await.unwrap();

        let loaded = store.load(cp.operation_id).await.unwrap().unwrap();
        assert_eq!(loaded.completed(), Some(WatermarkRange::new(1, 10).unwrap()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_delete_and_missing() {
        let store = InMemoryCheckpointStore::new();
        let cp = checkpoint();
        assert!(store.load(cp.operation_id).await.unwrap().is_none());
        assert!(!store.delete(cp.operation_id).await.unwrap());

        store.save(&cp).await.unwrap();
        assert!(store.delete(cp.operation_id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path().join("checkpoints"))
            .await
            .unwrap();

        let mut first = checkpoint();
        first.snapshot_target(40);
        first
            .advance_completed(WatermarkRange::new(1, 20).unwrap())
            .unwrap();
        let second = checkpoint();

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        // ignored by list
        tokio::fs::write(store.directory().join("notes.txt"), b"x")
            .await
            .unwrap();

        let loaded = store.load(first.operation_id).await.unwrap().unwrap();
        assert_eq!(loaded, first);
        assert_eq!(loaded.percent_complete(), 50);

        let mut expected = vec![first.operation_id, second.operation_id];
        expected.sort();
        assert_eq!(store.list().await.unwrap(), expected);

        assert!(store.delete(second.operation_id).await.unwrap());
        assert!(store.load(second.operation_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let cp = checkpoint();
        tokio::fs::write(store.path_for(cp.operation_id), b"{not json")
            .await
            .unwrap();

        let error = store.load(cp.operation_id).await.unwrap_err();
        assert!(format!("{error:#}").contains("decoding checkpoint"));
    }
}
