// Batch stage set - derived view over every stage instance of one batch

use serde::Serialize;
use tracing::warn;

use super::catalog::StageCatalog;
use super::types::{BatchId, StageId, StageStatus, StageType, VerificationStage};

/// All stage instances known for one batch plus the fields derived from them.
///
/// Only ever built whole through [`BatchStageSet::derive`], so the derived fields
/// cannot drift from the stage list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStageSet {
    batch_id: BatchId,
    stages: Vec<VerificationStage>,
    total_stage_types: usize,
    progress_percent: u8,
    next_stage_type: Option<StageType>,
    is_complete: bool,
}

impl BatchStageSet {
    pub fn derive(
        catalog: &StageCatalog,
        batch_id: BatchId,
        stages: impl IntoIterator<Item = VerificationStage>,
    ) -> Self {
        let mut kept: Vec<(usize, VerificationStage)> = Vec::new();

        for stage in stages {
            if stage.batch_id != batch_id {
                warn!(
                    batch_id = %batch_id,
                    stage_id = %stage.id,
                    other_batch = %stage.batch_id,
                    "Ignoring stage that belongs to another batch"
                );
                continue;
            }
            let Some(index) = catalog.index_of(stage.stage_type) else {
                warn!(
                    batch_id = %batch_id,
                    stage_id = %stage.id,
                    stage_type = %stage.stage_type,
                    "Ignoring stage type outside the active catalog"
                );
                continue;
            };
            match kept.iter_mut().find(|(i, _)| *i == index) {
                Some((_, existing)) => {
                    let dropped = keep_earliest(existing, stage);
                    warn!(
                        batch_id = %batch_id,
                        stage_type = %dropped.stage_type,
                        kept = %existing.id,
                        dropped = %dropped.id,
                        "Duplicate stage instance for one stage type"
                    );
                }
                None => kept.push((index, stage)),
            }
        }

        kept.sort_by_key(|(index, _)| *index);

        let total = catalog.len();
        let approved = kept
            .iter()
            .filter(|(_, s)| s.status == StageStatus::Approved)
            .count();
        let next_stage_type = catalog
            .all_stage_types()
            .iter()
            .enumerate()
            .find(|(i, _)| !kept.iter().any(|(k, _)| k == i))
            .map(|(_, t)| *t);

        Self {
            batch_id,
            stages: kept.into_iter().map(|(_, s)| s).collect(),
            total_stage_types: total,
            progress_percent: progress_percent(approved, total),
            next_stage_type,
            is_complete: total > 0 && approved == total,
        }
    }

    /// Set for a batch with no stage instances yet
    pub fn empty(catalog: &StageCatalog, batch_id: BatchId) -> Self {
        Self::derive(catalog, batch_id, Vec::new())
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn stages(&self) -> &[VerificationStage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<VerificationStage> {
        self.stages
    }

    pub fn stage(&self, stage_id: &StageId) -> Option<&VerificationStage> {
        self.stages.iter().find(|s| &s.id == stage_id)
    }

    pub fn stage_of_type(&self, stage_type: StageType) -> Option<&VerificationStage> {
        self.stages.iter().find(|s| s.stage_type == stage_type)
    }

    pub fn total_stage_types(&self) -> usize {
        self.total_stage_types
    }

    pub fn approved_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Approved)
            .count()
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn next_stage_type(&self) -> Option<StageType> {
        self.next_stage_type
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn pending_stages(&self) -> impl Iterator<Item = &VerificationStage> {
        self.stages.iter().filter(|s| s.is_pending())
    }
}

/// round(100 * approved / total), halves rounding up
fn progress_percent(approved: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let approved = approved.min(total);
    ((200 * approved + total) / (2 * total)) as u8
}

/// Keep whichever of the two records was created first and return the other
fn keep_earliest(existing: &mut VerificationStage, incoming: VerificationStage) -> VerificationStage {
    if incoming.created_at < existing.created_at {
        std::mem::replace(existing, incoming)
    } else {
        incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn stage(batch: &str, id: &str, stage_type: StageType, status: StageStatus) -> VerificationStage {
        VerificationStage {
            id: StageId::new(id),
            batch_id: BatchId::new(batch).unwrap(),
            stage_type,
            status,
            location: None,
            notes: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    fn three_stage_catalog() -> StageCatalog {
        StageCatalog::new(vec![
            StageType::Harvest,
            StageType::Processing,
            StageType::Packaging,
        ])
        .unwrap()
    }

    #[test]
    fn test_progress_rounding() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(1, 8), 13);
        assert_eq!(progress_percent(1, 200), 1);
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn test_progress_always_within_bounds() {
        for total in 1..=12 {
            for approved in 0..=total {
                let pct = progress_percent(approved, total);
                assert!(pct <= 100);
                let exact = 100.0 * approved as f64 / total as f64;
                assert!((pct as f64 - exact).abs() <= 0.5);
            }
        }
    }

    #[test]
    fn test_empty_set() {
        let catalog = three_stage_catalog();
        let set = BatchStageSet::empty(&catalog, BatchId::new("LOT-1").unwrap());
        assert_eq!(set.next_stage_type(), Some(StageType::Harvest));
        assert_eq!(set.progress_percent(), 0);
        assert!(!set.is_complete());
        assert!(set.stages().is_empty());
    }

    #[test]
    fn test_derivation_orders_by_catalog() {
        let catalog = three_stage_catalog();
        let set = BatchStageSet::derive(
            &catalog,
            BatchId::new("LOT-1").unwrap(),
            vec![
                stage("LOT-1", "b", StageType::Processing, StageStatus::Pending),
                stage("LOT-1", "a", StageType::Harvest, StageStatus::Approved),
            ],
        );
        let types: Vec<_> = set.stages().iter().map(|s| s.stage_type).collect();
        assert_eq!(types, vec![StageType::Harvest, StageType::Processing]);
        assert_eq!(set.progress_percent(), 33);
        assert_eq!(set.next_stage_type(), Some(StageType::Packaging));
        assert_eq!(set.pending_stages().count(), 1);
    }

    #[test]
    fn test_complete_only_when_all_approved() {
        let catalog = three_stage_catalog();
        let batch = BatchId::new("LOT-1").unwrap();
        let mut stages = vec![
            stage("LOT-1", "a", StageType::Harvest, StageStatus::Approved),
            stage("LOT-1", "b", StageType::Processing, StageStatus::Approved),
            stage("LOT-1", "c", StageType::Packaging, StageStatus::Flagged),
        ];
        let set = BatchStageSet::derive(&catalog, batch.clone(), stages.clone());
        assert!(!set.is_complete());
        assert_eq!(set.next_stage_type(), None);
        assert_eq!(set.progress_percent(), 67);

        stages[2].status = StageStatus::Approved;
        let set = BatchStageSet::derive(&catalog, batch, stages);
        assert!(set.is_complete());
        assert_eq!(set.progress_percent(), 100);
        assert_eq!(set.approved_count(), 3);
    }

    #[test]
    fn test_foreign_and_duplicate_stages_dropped() {
        let catalog = three_stage_catalog();
        let mut older = stage("LOT-1", "old", StageType::Harvest, StageStatus::Approved);
        older.created_at = Utc::now() - Duration::hours(1);
        let set = BatchStageSet::derive(
            &catalog,
            BatchId::new("LOT-1").unwrap(),
            vec![
                stage("LOT-1", "new", StageType::Harvest, StageStatus::Pending),
                older,
                stage("LOT-2", "x", StageType::Processing, StageStatus::Pending),
                stage("LOT-1", "y", StageType::Delivery, StageStatus::Pending),
            ],
        );
        assert_eq!(set.stages().len(), 1);
        assert_eq!(set.stages()[0].id, StageId::new("old"));
        assert_eq!(set.next_stage_type(), Some(StageType::Processing));
    }

    #[test]
    fn test_next_stage_is_lowest_missing_index() {
        let catalog = three_stage_catalog();
        let set = BatchStageSet::derive(
            &catalog,
            BatchId::new("LOT-1").unwrap(),
            vec![stage("LOT-1", "c", StageType::Packaging, StageStatus::Pending)],
        );
        assert_eq!(set.next_stage_type(), Some(StageType::Harvest));
    }

    #[test]
    fn test_keep_earliest_reports_dropped_record() {
        let mut older = stage("LOT-1", "old", StageType::Harvest, StageStatus::Pending);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = stage("LOT-1", "new", StageType::Harvest, StageStatus::Pending);

        let mut kept = newer.clone();
        let dropped = keep_earliest(&mut kept, older.clone());
        assert_eq!(kept.id, StageId::new("old"));
        assert_eq!(dropped.id, StageId::new("new"));

        let mut kept = older;
        let dropped = keep_earliest(&mut kept, newer);
        assert_eq!(kept.id, StageId::new("old"));
        assert_eq!(dropped.id, StageId::new("new"));
    }
}
