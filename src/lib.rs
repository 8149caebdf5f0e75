// Stagegate Library - Sequential Stage Verification Engine
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod facade;
pub mod observability;
pub mod repository;
pub mod telemetry;
pub mod verification;

// Re-export key types for easy access
pub use config::{config, StageGateConfig};
pub use facade::{BoardError, BoardState, StageBoard};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics};
pub use repository::{FileStageRepository, InMemoryStageRepository, RepositoryError};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use verification::{
    BatchId, BatchStageSet, Decision, ErrorKind, Notes, StageAction, StageCatalog, StageId,
    StageRepository, StageStatus, StageType, VerificationStage, WorkflowError,
    WorkflowOrchestrator,
};
