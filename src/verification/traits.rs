// Repository interface for dependency injection - the engine never talks to storage directly

use async_trait::async_trait;

use super::types::{BatchId, StageId, StageStatus, StageType, VerificationStage};
use crate::repository::RepositoryError;

/// System of record for stage instances.
///
/// Implementations assign stage ids and creation timestamps, enforce uniqueness per
/// `(batch, stage type)` by returning [`RepositoryError::Conflict`], and treat re-applying
/// the same terminal status as a no-op success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageRepository: Send + Sync {
    /// Every stage instance currently stored for `batch_id`
    async fn fetch_stages(&self, batch_id: &BatchId) -> Result<Vec<VerificationStage>, RepositoryError>;

    /// Persist a new pending stage and return it as stored
    async fn create_stage(
        &self,
        batch_id: &BatchId,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError>;

    /// Move a stage to `status`, replacing its notes when `notes` is present
    async fn update_stage_status(
        &self,
        stage_id: &StageId,
        status: StageStatus,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError>;
}
