// Workflow orchestrator - validates stage transitions and serializes mutations per batch

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument};

use super::catalog::StageCatalog;
use super::errors::WorkflowError;
use super::guard::{MutationGuard, MutationRegistry};
use super::stage_set::BatchStageSet;
use super::traits::StageRepository;
use super::types::{
    normalize_text, BatchId, Decision, StageAction, StageId, StageType, VerificationStage,
};
use crate::observability::{workflow_metrics, OperationTimer};
use crate::repository::RepositoryError;
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Last derived set for a batch plus a counter bumped by every committed mutation
#[derive(Debug)]
struct WorkingSet {
    set: BatchStageSet,
    revision: u64,
}

/// The verification engine.
///
/// Owns one working set per loaded batch until [`unload`](Self::unload) drops it. Callers
/// only ever receive cloned snapshots; the working sets change through
/// [`load_stages`](Self::load_stages), [`create_stage`](Self::create_stage) and
/// [`decide`](Self::decide) alone.
pub struct WorkflowOrchestrator {
    repository: Arc<dyn StageRepository>,
    catalog: StageCatalog,
    working_sets: RwLock<HashMap<BatchId, WorkingSet>>,
    in_flight: MutationRegistry,
}

impl WorkflowOrchestrator {
    pub fn new(repository: Arc<dyn StageRepository>, catalog: StageCatalog) -> Self {
        Self {
            repository,
            catalog,
            working_sets: RwLock::new(HashMap::new()),
            in_flight: MutationRegistry::new(),
        }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    /// Fetch every stage of `batch_id` and rebuild its working set.
    ///
    /// Not guarded: may overlap another load or a mutation. If a mutation commits while
    /// the fetch is outstanding, the caller still gets the fetched view but the newer
    /// working set is kept.
    pub async fn load_stages(&self, batch_id: &BatchId) -> Result<BatchStageSet, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("load_stages", Some(batch_id.as_str()), &correlation_id);

        async move {
            let timer = OperationTimer::new("load_stages");
            let started_at_revision = self.revision(batch_id).await;

            let stages = self.repository.fetch_stages(batch_id).await.map_err(|e| {
                error!(batch_id = %batch_id, error = %e, "Failed to fetch stages");
                workflow_metrics().record_repository_failure();
                WorkflowError::LoadFailure(e)
            })?;

            let set = BatchStageSet::derive(&self.catalog, batch_id.clone(), stages);
            self.store_loaded(set.clone(), started_at_revision).await;

            workflow_metrics().record_load();
            info!(
                batch_id = %batch_id,
                stages = set.stages().len(),
                progress_percent = set.progress_percent(),
                next_stage = ?set.next_stage_type(),
                "Loaded batch stages"
            );
            timer.finish();
            Ok(set)
        }
        .instrument(span)
        .await
    }

    /// The stage type that may be created next, if any
    pub fn determine_next_creatable(set: &BatchStageSet) -> Option<StageType> {
        set.next_stage_type()
    }

    /// Open the next stage of a loaded batch.
    ///
    /// `stage_type` must be exactly the batch's next stage type. Blank `location` or
    /// `notes` are stored as absent. On any failure the working set is unchanged.
    pub async fn create_stage(
        &self,
        batch_id: &BatchId,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<BatchStageSet, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("create_stage", Some(batch_id.as_str()), &correlation_id);

        async move {
            let timer = OperationTimer::new("create_stage");
            let _guard = self.acquire(batch_id)?;

            let current = self
                .snapshot(batch_id)
                .await
                .ok_or_else(|| reject(WorkflowError::BatchNotLoaded(batch_id.clone())))?;

            let expected = Self::determine_next_creatable(&current);
            if expected != Some(stage_type) {
                return Err(reject(WorkflowError::OutOfSequence {
                    requested: stage_type,
                    expected,
                }));
            }

            let created = self
                .repository
                .create_stage(
                    batch_id,
                    stage_type,
                    normalize_text(location),
                    normalize_text(notes),
                )
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict { .. } => {
                        warn!(
                            batch_id = %batch_id,
                            stage_type = %stage_type,
                            "Repository already holds this stage type, local view is stale"
                        );
                        reject(WorkflowError::OutOfSequence {
                            requested: stage_type,
                            expected: None,
                        })
                    }
                    other => {
                        error!(
                            batch_id = %batch_id,
                            stage_type = %stage_type,
                            error = %other,
                            "Failed to create stage"
                        );
                        workflow_metrics().record_repository_failure();
                        WorkflowError::CreateFailure(other)
                    }
                })?;

            let stage_id = created.id.clone();
            let set = self
                .commit(batch_id, move |mut stages| {
                    stages.retain(|s| s.id != created.id);
                    stages.push(created);
                    stages
                })
                .await;

            workflow_metrics().record_stage_created();
            info!(
                batch_id = %batch_id,
                stage_id = %stage_id,
                stage_type = %stage_type,
                progress_percent = set.progress_percent(),
                "Stage created"
            );
            timer.finish();
            Ok(set)
        }
        .instrument(span)
        .await
    }

    /// Approve, reject or flag a pending stage.
    ///
    /// Terminal statuses are final: deciding a stage that is no longer pending fails with
    /// `AlreadyDecided` without contacting the repository.
    pub async fn decide(
        &self,
        stage_id: &StageId,
        decision: Decision,
    ) -> Result<BatchStageSet, WorkflowError> {
        let batch_id = self
            .owning_batch(stage_id)
            .await
            .ok_or_else(|| reject(WorkflowError::StageNotFound(stage_id.clone())))?;

        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("decide", Some(batch_id.as_str()), &correlation_id);

        async move {
            let timer = OperationTimer::new("decide");
            let _guard = self.acquire(&batch_id)?;

            let current = self
                .snapshot(&batch_id)
                .await
                .ok_or_else(|| reject(WorkflowError::BatchNotLoaded(batch_id.clone())))?;
            let stage = current
                .stage(stage_id)
                .ok_or_else(|| reject(WorkflowError::StageNotFound(stage_id.clone())))?;

            if stage.status.is_terminal() {
                return Err(reject(WorkflowError::AlreadyDecided {
                    stage_id: stage_id.clone(),
                    status: stage.status,
                }));
            }

            let target = decision.target_status();
            let mut updated = match self
                .repository
                .update_stage_status(stage_id, target, decision.notes().map(str::to_string))
                .await
            {
                Ok(updated) => updated,
                Err(RepositoryError::InvalidTransition { from, .. }) if from.is_terminal() => {
                    warn!(
                        batch_id = %batch_id,
                        stage_id = %stage_id,
                        stored = %from,
                        "Repository already holds a decision, local view is stale"
                    );
                    self.resync(&batch_id).await;
                    return Err(reject(WorkflowError::AlreadyDecided {
                        stage_id: stage_id.clone(),
                        status: from,
                    }));
                }
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        stage_id = %stage_id,
                        status = %target,
                        error = %e,
                        "Failed to record decision"
                    );
                    workflow_metrics().record_repository_failure();
                    return Err(WorkflowError::DecisionFailure(e));
                }
            };

            if updated.status != target {
                warn!(
                    stage_id = %stage_id,
                    requested = %target,
                    stored = %updated.status,
                    "Repository reported a different status than requested"
                );
            }
            if updated.status.is_terminal() && updated.decided_at.is_none() {
                updated.decided_at = Some(Utc::now());
            }

            let status = updated.status;
            let set = self
                .commit(&batch_id, move |mut stages| {
                    stages.retain(|s| s.id != updated.id);
                    stages.push(updated);
                    stages
                })
                .await;

            workflow_metrics().record_decision();
            info!(
                batch_id = %batch_id,
                stage_id = %stage_id,
                status = %status,
                progress_percent = set.progress_percent(),
                is_complete = set.is_complete(),
                "Stage decided"
            );
            timer.finish();
            Ok(set)
        }
        .instrument(span)
        .await
    }

    /// [`decide`](Self::decide) from an untyped action and optional notes
    pub async fn decide_action(
        &self,
        stage_id: &StageId,
        action: StageAction,
        notes: Option<String>,
    ) -> Result<BatchStageSet, WorkflowError> {
        let decision = Decision::from_action(action, notes).map_err(reject)?;
        self.decide(stage_id, decision).await
    }

    /// Snapshot of the batch's current working set, if loaded
    pub async fn working_set(&self, batch_id: &BatchId) -> Option<BatchStageSet> {
        self.snapshot(batch_id).await
    }

    pub fn is_mutation_in_progress(&self, batch_id: &BatchId) -> bool {
        self.in_flight.is_busy(batch_id)
    }

    /// Drop the batch's working set. Later mutations fail with `BatchNotLoaded` until it is
    /// loaded again. Returns whether the batch was loaded.
    ///
    /// Takes the batch guard, so it fails with `OperationInProgress` while a mutation runs.
    pub async fn unload(&self, batch_id: &BatchId) -> Result<bool, WorkflowError> {
        let _guard = self.acquire(batch_id)?;
        let removed = self.working_sets.write().await.remove(batch_id).is_some();
        if removed {
            debug!(batch_id = %batch_id, "Unloaded batch working set");
        }
        Ok(removed)
    }

    fn acquire(&self, batch_id: &BatchId) -> Result<MutationGuard<'_>, WorkflowError> {
        self.in_flight.try_acquire(batch_id).ok_or_else(|| {
            workflow_metrics().record_guard_contention();
            reject(WorkflowError::OperationInProgress(batch_id.clone()))
        })
    }

    async fn snapshot(&self, batch_id: &BatchId) -> Option<BatchStageSet> {
        self.working_sets
            .read()
            .await
            .get(batch_id)
            .map(|w| w.set.clone())
    }

    async fn revision(&self, batch_id: &BatchId) -> Option<u64> {
        self.working_sets
            .read()
            .await
            .get(batch_id)
            .map(|w| w.revision)
    }

    async fn owning_batch(&self, stage_id: &StageId) -> Option<BatchId> {
        self.working_sets
            .read()
            .await
            .values()
            .find(|w| w.set.stage(stage_id).is_some())
            .map(|w| w.set.batch_id().clone())
    }

    async fn store_loaded(&self, set: BatchStageSet, started_at_revision: Option<u64>) {
        let started_at_revision = started_at_revision.unwrap_or(0);
        let mut sets = self.working_sets.write().await;
        match sets.get_mut(set.batch_id()) {
            Some(current) if current.revision != started_at_revision => {
                debug!(
                    batch_id = %set.batch_id(),
                    "Mutation committed during load, keeping newer working set"
                );
            }
            Some(current) => current.set = set,
            None => {
                sets.insert(set.batch_id().clone(), WorkingSet { set, revision: 0 });
            }
        }
    }

    /// Replace the working set with a fresh fetch. Called with the batch guard held.
    async fn resync(&self, batch_id: &BatchId) {
        match self.repository.fetch_stages(batch_id).await {
            Ok(stages) => {
                self.commit(batch_id, move |_| stages).await;
            }
            Err(e) => {
                debug!(batch_id = %batch_id, error = %e, "Resync after stale decision failed");
            }
        }
    }

    /// Rebuild the batch's working set from an updated stage list, as one replacement
    async fn commit<F>(&self, batch_id: &BatchId, update: F) -> BatchStageSet
    where
        F: FnOnce(Vec<VerificationStage>) -> Vec<VerificationStage>,
    {
        let mut sets = self.working_sets.write().await;
        let working = sets.entry(batch_id.clone()).or_insert_with(|| WorkingSet {
            set: BatchStageSet::empty(&self.catalog, batch_id.clone()),
            revision: 0,
        });
        let stages = update(working.set.stages().to_vec());
        working.set = BatchStageSet::derive(&self.catalog, batch_id.clone(), stages);
        working.revision += 1;
        working.set.clone()
    }
}

fn reject(err: WorkflowError) -> WorkflowError {
    warn!(reason = %err, "Workflow precondition rejected");
    workflow_metrics().record_precondition_rejection();
    err
}
