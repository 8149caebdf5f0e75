// Stage catalog - the ordered list of checkpoints every batch passes through

use thiserror::Error;

use super::types::StageType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("stage catalog must contain at least one stage type")]
    Empty,
    #[error("stage type {0} appears more than once in the catalog")]
    Duplicate(StageType),
}

/// Immutable, totally ordered set of stage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCatalog {
    stages: Vec<StageType>,
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self {
            stages: StageType::ALL.to_vec(),
        }
    }
}

impl StageCatalog {
    pub fn new(stages: Vec<StageType>) -> Result<Self, CatalogError> {
        if stages.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(CatalogError::Duplicate(*stage));
            }
        }
        Ok(Self { stages })
    }

    pub fn all_stage_types(&self) -> &[StageType] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Position of `stage_type` in the ordering, or `None` if this catalog doesn't use it
    pub fn index_of(&self, stage_type: StageType) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage_type)
    }

    pub fn contains(&self, stage_type: StageType) -> bool {
        self.index_of(stage_type).is_some()
    }

    pub fn first(&self) -> StageType {
        self.stages[0]
    }

    pub fn next_after(&self, stage_type: StageType) -> Option<StageType> {
        let index = self.index_of(stage_type)?;
        self.stages.get(index + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = StageCatalog::default();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.first(), StageType::Harvest);
        assert_eq!(catalog.index_of(StageType::Delivery), Some(4));
        assert_eq!(catalog.all_stage_types(), catalog.all_stage_types());
    }

    #[test]
    fn test_next_after() {
        let catalog = StageCatalog::default();
        assert_eq!(catalog.next_after(StageType::Harvest), Some(StageType::Processing));
        assert_eq!(catalog.next_after(StageType::Shipping), Some(StageType::Delivery));
        assert_eq!(catalog.next_after(StageType::Delivery), None);
    }

    #[test]
    fn test_subset_catalog() {
        let catalog = StageCatalog::new(vec![
            StageType::Harvest,
            StageType::Packaging,
            StageType::Delivery,
        ])
        .unwrap();
        assert_eq!(catalog.index_of(StageType::Packaging), Some(1));
        assert_eq!(catalog.index_of(StageType::Processing), None);
        assert_eq!(catalog.next_after(StageType::Harvest), Some(StageType::Packaging));
        assert_eq!(catalog.next_after(StageType::Shipping), None);
    }

    #[test]
    fn test_invalid_catalogs() {
        assert_eq!(StageCatalog::new(vec![]), Err(CatalogError::Empty));
        assert_eq!(
            StageCatalog::new(vec![StageType::Harvest, StageType::Shipping, StageType::Harvest]),
            Err(CatalogError::Duplicate(StageType::Harvest))
        );
    }
}
