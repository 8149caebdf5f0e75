use thiserror::Error;

use super::types::{BatchId, StageId, StageStatus, StageType};
use crate::repository::RepositoryError;

/// Everything the workflow engine can refuse or fail with.
///
/// Precondition variants are produced before any repository call and guarantee the
/// working set was left untouched. `LoadFailure`, `CreateFailure` and `DecisionFailure`
/// wrap the repository cause.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("batch id must not be empty")]
    InvalidBatchId,

    #[error("batch {0} has not been loaded")]
    BatchNotLoaded(BatchId),

    #[error("stage {0} is not part of any loaded batch")]
    StageNotFound(StageId),

    #[error("cannot create {requested} stage out of order (expected {expected:?})")]
    OutOfSequence {
        requested: StageType,
        expected: Option<StageType>,
    },

    #[error("another operation is in progress for batch {0}")]
    OperationInProgress(BatchId),

    #[error("notes are required to reject or flag a stage")]
    NotesRequired,

    #[error("stage {stage_id} was already decided as {status}")]
    AlreadyDecided {
        stage_id: StageId,
        status: StageStatus,
    },

    #[error("failed to load stages: {0}")]
    LoadFailure(#[source] RepositoryError),

    #[error("failed to create stage: {0}")]
    CreateFailure(#[source] RepositoryError),

    #[error("failed to record decision: {0}")]
    DecisionFailure(#[source] RepositoryError),
}

/// Coarse classification used by callers to pick an affordance or message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotLoaded,
    WrongOrder,
    InProgress,
    NotesRequired,
    AlreadyDecided,
    Network,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidBatchId => ErrorKind::InvalidInput,
            WorkflowError::BatchNotLoaded(_) | WorkflowError::StageNotFound(_) => {
                ErrorKind::NotLoaded
            }
            WorkflowError::OutOfSequence { .. } => ErrorKind::WrongOrder,
            WorkflowError::OperationInProgress(_) => ErrorKind::InProgress,
            WorkflowError::NotesRequired => ErrorKind::NotesRequired,
            WorkflowError::AlreadyDecided { .. } => ErrorKind::AlreadyDecided,
            WorkflowError::LoadFailure(_)
            | WorkflowError::CreateFailure(_)
            | WorkflowError::DecisionFailure(_) => ErrorKind::Network,
        }
    }

    /// Short message safe to show to an operator. Never includes the underlying cause.
    pub fn user_message(&self) -> &'static str {
        match self {
            WorkflowError::InvalidBatchId => "A batch must be selected.",
            WorkflowError::BatchNotLoaded(_) => "Batch stages are not loaded yet. Refresh and try again.",
            WorkflowError::StageNotFound(_) => "That stage could not be found. Refresh and try again.",
            WorkflowError::OutOfSequence { .. } => "Stages must be created in order.",
            WorkflowError::OperationInProgress(_) => "Another change is still being saved.",
            WorkflowError::NotesRequired => "Notes are required to reject or flag a stage.",
            WorkflowError::AlreadyDecided { .. } => "This stage has already been decided.",
            WorkflowError::LoadFailure(_) => "Could not load stages. Check your connection.",
            WorkflowError::CreateFailure(_) | WorkflowError::DecisionFailure(_) => {
                "Network or server error. Refresh before trying again."
            }
        }
    }

    pub fn is_precondition(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Network)
    }

    /// Whether the caller may repeat the same call as-is.
    ///
    /// A failed create is never blindly retryable: the server may have stored the stage
    /// before the response was lost, so the batch must be reloaded first.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::LoadFailure(cause) | WorkflowError::DecisionFailure(cause) => {
                cause.is_transient()
            }
            _ => false,
        }
    }

    /// True for `AlreadyDecided` when the stage already sits in `target`.
    ///
    /// Lets a retry after a lost response treat the desired end state as success.
    pub fn already_reached(&self, target: StageStatus) -> bool {
        matches!(self, WorkflowError::AlreadyDecided { status, .. } if *status == target)
    }
}
