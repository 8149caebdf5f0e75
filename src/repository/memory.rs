use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::errors::RepositoryError;
use crate::verification::{
    BatchId, StageId, StageRepository, StageStatus, StageType, VerificationStage,
};

/// In-memory repository. Not durable, but enforces the same rules as a real backend.
#[derive(Debug, Default)]
pub struct InMemoryStageRepository {
    stages: Mutex<Vec<VerificationStage>>,
}

impl InMemoryStageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with existing records, bypassing all checks
    pub fn with_stages(stages: Vec<VerificationStage>) -> Self {
        Self {
            stages: Mutex::new(stages),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<VerificationStage>> {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StageRepository for InMemoryStageRepository {
    async fn fetch_stages(&self, batch_id: &BatchId) -> Result<Vec<VerificationStage>, RepositoryError> {
        Ok(self
            .lock()
            .iter()
            .filter(|s| &s.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn create_stage(
        &self,
        batch_id: &BatchId,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        let mut stages = self.lock();
        insert_new_stage(&mut stages, batch_id, stage_type, location, notes)
    }

    async fn update_stage_status(
        &self,
        stage_id: &StageId,
        status: StageStatus,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        let mut stages = self.lock();
        apply_status(&mut stages, stage_id, status, notes)
    }
}

/// Append a fresh pending stage, refusing a second instance of the same type
pub(crate) fn insert_new_stage(
    stages: &mut Vec<VerificationStage>,
    batch_id: &BatchId,
    stage_type: StageType,
    location: Option<String>,
    notes: Option<String>,
) -> Result<VerificationStage, RepositoryError> {
    if stages
        .iter()
        .any(|s| &s.batch_id == batch_id && s.stage_type == stage_type)
    {
        return Err(RepositoryError::Conflict {
            batch_id: batch_id.clone(),
            stage_type,
        });
    }

    let stage = VerificationStage {
        id: StageId::new(Uuid::new_v4().to_string()),
        batch_id: batch_id.clone(),
        stage_type,
        status: StageStatus::Pending,
        location,
        notes,
        created_at: Utc::now(),
        decided_at: None,
    };
    stages.push(stage.clone());
    Ok(stage)
}

/// Move a pending stage to a terminal status. Re-applying the stored status is a no-op.
pub(crate) fn apply_status(
    stages: &mut [VerificationStage],
    stage_id: &StageId,
    status: StageStatus,
    notes: Option<String>,
) -> Result<VerificationStage, RepositoryError> {
    let stage = stages
        .iter_mut()
        .find(|s| &s.id == stage_id)
        .ok_or_else(|| RepositoryError::NotFound(stage_id.clone()))?;

    if stage.status == status && status.is_terminal() {
        return Ok(stage.clone());
    }
    if stage.status.is_terminal() || !status.is_terminal() {
        return Err(RepositoryError::InvalidTransition {
            stage_id: stage_id.clone(),
            from: stage.status,
            to: status,
        });
    }

    stage.status = status;
    if notes.is_some() {
        stage.notes = notes;
    }
    stage.decided_at = Some(Utc::now());
    Ok(stage.clone())
}
