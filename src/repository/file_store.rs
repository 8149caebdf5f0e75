use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::errors::RepositoryError;
use super::memory::{apply_status, insert_new_stage};
use crate::verification::{
    BatchId, StageId, StageRepository, StageStatus, StageType, VerificationStage,
};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the stage store
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StageDocument {
    version: u32,
    stages: Vec<VerificationStage>,
}

impl Default for StageDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            stages: Vec::new(),
        }
    }
}

/// Repository persisted as a single JSON document.
///
/// Writes go through a temp file and rename. Writers are serialized in-process by a
/// mutex and across processes by an advisory lock on `<path>.lock`; a writer that finds
/// the lock taken fails with [`RepositoryError::Unavailable`] instead of waiting.
pub struct FileStageRepository {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStageRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        Self {
            path,
            lock_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.tmp", self.path.display()))
    }

    async fn ensure_parent(&self) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    async fn read_document(&self) -> Result<StageDocument, RepositoryError> {
        if !fs::try_exists(&self.path).await? {
            debug!(file = ?self.path, "No stage store yet, starting empty");
            return Ok(StageDocument::default());
        }

        let contents = fs::read_to_string(&self.path).await?;
        let document: StageDocument = serde_json::from_str(&contents)?;
        if document.version != DOCUMENT_VERSION {
            return Err(RepositoryError::Unavailable(format!(
                "unsupported stage store version {} in {}",
                document.version,
                self.path.display()
            )));
        }
        Ok(document)
    }

    async fn write_document(&self, document: &StageDocument) -> Result<(), RepositoryError> {
        let serialized = serde_json::to_string_pretty(document)?;
        let temp_file = self.temp_path();
        let written = async {
            fs::write(&temp_file, serialized).await?;
            fs::rename(&temp_file, &self.path).await
        }
        .await;

        if let Err(e) = written {
            warn!(file = ?self.path, error = %e, "Stage store write failed, discarding temp file");
            fs::remove_file(&temp_file).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Read-modify-write the document while holding both locks
    async fn modify<T, F>(&self, change: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Vec<VerificationStage>) -> Result<T, RepositoryError> + Send,
        T: Send,
    {
        let _local = self.write_lock.lock().await;
        self.ensure_parent().await?;

        let lock_path = self.lock_path.clone();
        let lock_file = tokio::task::spawn_blocking(move || {
            OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(lock_path)
        })
        .await
        .map_err(|e| RepositoryError::Unavailable(format!("lock file task failed: {e}")))??;
        // Non-blocking: a held lock fails fast
        let mut file_lock = fd_lock::RwLock::new(lock_file);
        let _held = file_lock.try_write().map_err(|_| {
            RepositoryError::Unavailable(format!(
                "{} is locked by another process",
                self.path.display()
            ))
        })?;

        let mut document = self.read_document().await?;
        let result = change(&mut document.stages)?;
        self.write_document(&document).await?;
        Ok(result)
    }
}

#[async_trait]
impl StageRepository for FileStageRepository {
    async fn fetch_stages(&self, batch_id: &BatchId) -> Result<Vec<VerificationStage>, RepositoryError> {
        let document = self.read_document().await?;
        Ok(document
            .stages
            .into_iter()
            .filter(|s| &s.batch_id == batch_id)
            .collect())
    }

    async fn create_stage(
        &self,
        batch_id: &BatchId,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        let stage = self
            .modify(|stages| insert_new_stage(stages, batch_id, stage_type, location, notes))
            .await?;
        info!(
            batch_id = %batch_id,
            stage_id = %stage.id,
            file = ?self.path,
            "Stage persisted"
        );
        Ok(stage)
    }

    async fn update_stage_status(
        &self,
        stage_id: &StageId,
        status: StageStatus,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        let stage = self
            .modify(|stages| apply_status(stages, stage_id, status, notes))
            .await?;
        info!(
            stage_id = %stage_id,
            status = %stage.status,
            file = ?self.path,
            "Stage status persisted"
        );
        Ok(stage)
    }
}
