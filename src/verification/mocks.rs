// Mock repository for testing - records calls, can hold them at a gate, can inject failures

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Semaphore;

use crate::repository::{InMemoryStageRepository, RepositoryError};
use crate::verification::traits::StageRepository;
use crate::verification::types::*;

/// One call observed by [`RecordingStageRepository`]
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryCall {
    FetchStages { batch_id: BatchId },
    CreateStage { batch_id: BatchId, stage_type: StageType },
    UpdateStageStatus { stage_id: StageId, status: StageStatus },
}

/// In-memory repository wrapper that tracks every call.
///
/// When a gate is closed the matching calls park until [`release_fetches`] or
/// [`release_mutations`] hands out a permit. Fetches read their data before parking, so a
/// released fetch returns what was stored when it started.
///
/// [`release_fetches`]: RecordingStageRepository::release_fetches
/// [`release_mutations`]: RecordingStageRepository::release_mutations
#[derive(Debug)]
pub struct RecordingStageRepository {
    inner: InMemoryStageRepository,
    calls: Mutex<Vec<RepositoryCall>>,
    fail_next: Mutex<Option<RepositoryError>>,
    gate_fetches: AtomicBool,
    gate_mutations: AtomicBool,
    fetch_permits: Semaphore,
    mutation_permits: Semaphore,
}

impl Default for RecordingStageRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStageRepository {
    pub fn new() -> Self {
        Self::with_stages(Vec::new())
    }

    pub fn with_stages(stages: Vec<VerificationStage>) -> Self {
        Self {
            inner: InMemoryStageRepository::with_stages(stages),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            gate_fetches: AtomicBool::new(false),
            gate_mutations: AtomicBool::new(false),
            fetch_permits: Semaphore::new(0),
            mutation_permits: Semaphore::new(0),
        }
    }

    /// Make the next call of any kind fail with `error`
    pub fn fail_next(&self, error: RepositoryError) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn close_fetch_gate(&self) {
        self.gate_fetches.store(true, Ordering::SeqCst);
    }

    pub fn close_mutation_gate(&self) {
        self.gate_mutations.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self, n: usize) {
        self.fetch_permits.add_permits(n);
    }

    pub fn release_mutations(&self, n: usize) {
        self.mutation_permits.add_permits(n);
    }

    pub fn calls(&self) -> Vec<RepositoryCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn mutation_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, RepositoryCall::FetchStages { .. }))
            .count()
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }

    fn record(&self, call: RepositoryCall) -> Result<(), RepositoryError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        match self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn pass(gated: &AtomicBool, permits: &Semaphore) {
        if gated.load(Ordering::SeqCst) {
            if let Ok(permit) = permits.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl StageRepository for RecordingStageRepository {
    async fn fetch_stages(&self, batch_id: &BatchId) -> Result<Vec<VerificationStage>, RepositoryError> {
        self.record(RepositoryCall::FetchStages {
            batch_id: batch_id.clone(),
        })?;
        let stages = self.inner.fetch_stages(batch_id).await?;
        Self::pass(&self.gate_fetches, &self.fetch_permits).await;
        Ok(stages)
    }

    async fn create_stage(
        &self,
        batch_id: &BatchId,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        self.record(RepositoryCall::CreateStage {
            batch_id: batch_id.clone(),
            stage_type,
        })?;
        Self::pass(&self.gate_mutations, &self.mutation_permits).await;
        self.inner
            .create_stage(batch_id, stage_type, location, notes)
            .await
    }

    async fn update_stage_status(
        &self,
        stage_id: &StageId,
        status: StageStatus,
        notes: Option<String>,
    ) -> Result<VerificationStage, RepositoryError> {
        self.record(RepositoryCall::UpdateStageStatus {
            stage_id: stage_id.clone(),
            status,
        })?;
        Self::pass(&self.gate_mutations, &self.mutation_permits).await;
        self.inner.update_stage_status(stage_id, status, notes).await
    }
}
