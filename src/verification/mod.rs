// Verification Workflow Module - Sequential Stage Approval Engine
//
// A batch passes through an ordered catalog of stages. Each stage is created strictly
// in order and must be decided by a human before the batch is complete.

pub mod catalog;
pub mod errors;
mod guard;
pub mod orchestrator;
pub mod stage_set;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use catalog::{CatalogError, StageCatalog};
pub use errors::{ErrorKind, WorkflowError};
pub use orchestrator::WorkflowOrchestrator;
pub use stage_set::BatchStageSet;
pub use traits::StageRepository;
pub use types::{
    BatchId, Decision, Notes, StageAction, StageId, StageStatus, StageType, UnknownStageType,
    VerificationStage,
};
