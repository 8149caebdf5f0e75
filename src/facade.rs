// Client facade - one batch's view of the workflow, published to subscribers

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::verification::{
    BatchId, BatchStageSet, ErrorKind, StageAction, StageId, StageType, WorkflowError,
    WorkflowOrchestrator,
};

/// Last failure as shown to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&WorkflowError> for BoardError {
    fn from(err: &WorkflowError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub stage_set: Option<BatchStageSet>,
    pub mutation_in_progress: bool,
    pub last_error: Option<BoardError>,
}

/// Binds an orchestrator to a single batch and keeps a [`BoardState`] current for it.
///
/// Every operation republishes the orchestrator's working set when it finishes,
/// successful or not, so subscribers never see a set the engine did not commit.
pub struct StageBoard {
    orchestrator: Arc<WorkflowOrchestrator>,
    batch_id: BatchId,
    state: watch::Sender<BoardState>,
}

impl StageBoard {
    pub fn new(orchestrator: Arc<WorkflowOrchestrator>, batch_id: BatchId) -> Self {
        let (state, _) = watch::channel(BoardState::default());
        Self {
            orchestrator,
            batch_id,
            state,
        }
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub async fn refresh(&self) -> Result<BatchStageSet, WorkflowError> {
        let result = self.orchestrator.load_stages(&self.batch_id).await;
        self.publish(result.as_ref().err()).await;
        result
    }

    /// Create whatever stage type comes next. `Ok(None)` when the batch needs no more stages.
    pub async fn create_next_stage(
        &self,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<Option<BatchStageSet>, WorkflowError> {
        let next = match self.orchestrator.working_set(&self.batch_id).await {
            Some(set) => WorkflowOrchestrator::determine_next_creatable(&set),
            None => {
                let err = WorkflowError::BatchNotLoaded(self.batch_id.clone());
                self.publish(Some(&err)).await;
                return Err(err);
            }
        };

        match next {
            Some(stage_type) => self
                .create_stage(stage_type, location, notes)
                .await
                .map(Some),
            None => {
                debug!(batch_id = %self.batch_id, "Batch complete, nothing to create");
                Ok(None)
            }
        }
    }

    pub async fn create_stage(
        &self,
        stage_type: StageType,
        location: Option<String>,
        notes: Option<String>,
    ) -> Result<BatchStageSet, WorkflowError> {
        let _busy = self.mark_busy();
        let result = self
            .orchestrator
            .create_stage(&self.batch_id, stage_type, location, notes)
            .await;
        self.publish(result.as_ref().err()).await;
        result
    }

    pub async fn decide(
        &self,
        stage_id: &StageId,
        action: StageAction,
        notes: Option<String>,
    ) -> Result<BatchStageSet, WorkflowError> {
        let _busy = self.mark_busy();
        let result = self
            .orchestrator
            .decide_action(stage_id, action, notes)
            .await;
        self.publish(result.as_ref().err()).await;
        result
    }

    /// Whether a create would pass the engine's local checks right now
    pub fn can_create(&self) -> bool {
        let state = self.state.borrow();
        !state.mutation_in_progress
            && state
                .stage_set
                .as_ref()
                .is_some_and(|set| set.next_stage_type().is_some())
    }

    /// Whether `stage_id` is pending and no mutation is running
    pub fn can_decide(&self, stage_id: &StageId) -> bool {
        let state = self.state.borrow();
        !state.mutation_in_progress
            && state
                .stage_set
                .as_ref()
                .and_then(|set| set.stage(stage_id))
                .is_some_and(|stage| stage.is_pending())
    }

    fn mark_busy(&self) -> BusyMark<'_> {
        self.state.send_modify(|s| s.mutation_in_progress = true);
        BusyMark { board: self }
    }

    async fn publish(&self, error: Option<&WorkflowError>) {
        let stage_set = self.orchestrator.working_set(&self.batch_id).await;
        let busy = self.orchestrator.is_mutation_in_progress(&self.batch_id);
        self.state.send_modify(|s| {
            s.stage_set = stage_set;
            s.mutation_in_progress = busy;
            s.last_error = error.map(BoardError::from);
        });
    }
}

/// Clears the published in-progress flag when an operation ends or is dropped
struct BusyMark<'a> {
    board: &'a StageBoard,
}

impl Drop for BusyMark<'_> {
    fn drop(&mut self) {
        let busy = self
            .board
            .orchestrator
            .is_mutation_in_progress(&self.board.batch_id);
        self.board
            .state
            .send_if_modified(|s| std::mem::replace(&mut s.mutation_in_progress, busy) != busy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStageRepository;
    use crate::verification::mocks::RecordingStageRepository;
    use crate::verification::{StageCatalog, StageStatus, VerificationStage};
    use chrono::Utc;
    use tokio_test::{assert_pending, assert_ready, task};

    fn board() -> StageBoard {
        let catalog = StageCatalog::new(vec![StageType::Harvest, StageType::Processing]).unwrap();
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            Arc::new(InMemoryStageRepository::new()),
            catalog,
        ));
        StageBoard::new(orchestrator, BatchId::new("LOT-7").unwrap())
    }

    #[tokio::test]
    async fn test_refresh_publishes_stage_set() {
        let board = board();
        let mut rx = board.subscribe();
        assert!(board.state().stage_set.is_none());
        assert!(!board.can_create());

        board.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        let set = state.stage_set.unwrap();
        assert_eq!(set.next_stage_type(), Some(StageType::Harvest));
        assert!(!state.mutation_in_progress);
        assert!(board.can_create());
    }

    #[tokio::test]
    async fn test_create_before_refresh_records_error() {
        let board = board();
        let err = board.create_next_stage(None, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::BatchNotLoaded(_)));

        let state = board.state();
        let last = state.last_error.unwrap();
        assert_eq!(last.kind, ErrorKind::NotLoaded);
        assert_eq!(last.message, err.user_message());
    }

    #[tokio::test]
    async fn test_success_clears_last_error() {
        let board = board();
        board.refresh().await.unwrap();

        board
            .create_stage(StageType::Processing, None, None)
            .await
            .unwrap_err();
        assert_eq!(
            board.state().last_error.map(|e| e.kind),
            Some(ErrorKind::WrongOrder)
        );

        board.create_next_stage(Some("Field 2".into()), None).await.unwrap();
        let state = board.state();
        assert!(state.last_error.is_none());
        assert!(!state.mutation_in_progress);
    }

    #[tokio::test]
    async fn test_walk_batch_to_completion() {
        let board = board();
        board.refresh().await.unwrap();

        for _ in 0..2 {
            let set = board.create_next_stage(None, None).await.unwrap().unwrap();
            let pending = set.pending_stages().next().unwrap().id.clone();
            assert!(board.can_decide(&pending));
            let set = board
                .decide(&pending, StageAction::Approve, None)
                .await
                .unwrap();
            assert_eq!(set.stage(&pending).unwrap().status, StageStatus::Approved);
            assert!(!board.can_decide(&pending));
        }

        let state = board.state();
        let set = state.stage_set.unwrap();
        assert!(set.is_complete());
        assert_eq!(set.progress_percent(), 100);
        assert!(!board.can_create());
        assert_eq!(board.create_next_stage(None, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reject_without_notes_is_reported() {
        let board = board();
        board.refresh().await.unwrap();
        let set = board.create_next_stage(None, None).await.unwrap().unwrap();
        let id = set.stages()[0].id.clone();

        let err = board
            .decide(&id, StageAction::Reject, Some("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotesRequired));
        assert_eq!(
            board.state().last_error.map(|e| e.kind),
            Some(ErrorKind::NotesRequired)
        );
        assert!(board.can_decide(&id));
    }

    #[test]
    fn test_busy_flag_published_while_mutation_outstanding() {
        let harvest = VerificationStage {
            id: StageId::new("h"),
            batch_id: BatchId::new("LOT-8").unwrap(),
            stage_type: StageType::Harvest,
            status: StageStatus::Pending,
            location: None,
            notes: None,
            created_at: Utc::now(),
            decided_at: None,
        };
        let repo = Arc::new(RecordingStageRepository::with_stages(vec![harvest]));
        let catalog = StageCatalog::new(vec![StageType::Harvest, StageType::Processing]).unwrap();
        let orchestrator = Arc::new(WorkflowOrchestrator::new(repo.clone(), catalog));
        let board = StageBoard::new(orchestrator, BatchId::new("LOT-8").unwrap());
        let h = StageId::new("h");

        tokio_test::block_on(board.refresh()).unwrap();
        assert!(board.can_create());
        assert!(board.can_decide(&h));

        let mut rx = board.subscribe();
        repo.close_mutation_gate();
        let mut create = task::spawn(board.create_next_stage(None, None));
        assert_pending!(create.poll());

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().mutation_in_progress);
        assert!(board.state().mutation_in_progress);
        assert!(!board.can_create());
        assert!(!board.can_decide(&h));

        repo.release_mutations(1);
        let set = assert_ready!(create.poll()).unwrap().unwrap();
        assert!(set.stage_of_type(StageType::Processing).is_some());

        let state = board.state();
        assert!(!state.mutation_in_progress);
        assert!(state.last_error.is_none());
        assert!(board.can_decide(&h));
    }

    #[test]
    fn test_dropped_operation_clears_busy_flag() {
        let repo = Arc::new(RecordingStageRepository::new());
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            repo.clone(),
            StageCatalog::default(),
        ));
        let board = StageBoard::new(orchestrator, BatchId::new("LOT-9").unwrap());
        tokio_test::block_on(board.refresh()).unwrap();
        repo.close_mutation_gate();

        let mut create = task::spawn(board.create_stage(StageType::Harvest, None, None));
        assert_pending!(create.poll());
        assert!(board.state().mutation_in_progress);

        drop(create);
        assert!(!board.state().mutation_in_progress);
        assert!(board.can_create());
    }
}
