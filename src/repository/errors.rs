use thiserror::Error;

use crate::verification::{BatchId, StageId, StageStatus, StageType};

/// Failures surfaced by a stage repository backend
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("stage {stage_type} already exists for batch {batch_id}")]
    Conflict {
        batch_id: BatchId,
        stage_type: StageType,
    },

    #[error("stage {0} not found")]
    NotFound(StageId),

    #[error("stage {stage_id} cannot move from {from} to {to}")]
    InvalidTransition {
        stage_id: StageId,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Transient failures where repeating the same request is reasonable
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::Unavailable(_) | RepositoryError::Transport(_) | RepositoryError::Io(_)
        )
    }
}
