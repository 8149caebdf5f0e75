// Per-batch mutation guard - at most one create/decide in flight per batch

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::types::BatchId;

/// Set of batches with a mutation currently in flight
#[derive(Debug, Default)]
pub(crate) struct MutationRegistry {
    busy: Mutex<HashSet<BatchId>>,
}

impl MutationRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim the batch, or `None` if another mutation already holds it. Never waits.
    pub(crate) fn try_acquire(&self, batch_id: &BatchId) -> Option<MutationGuard<'_>> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(batch_id.clone()) {
            return None;
        }
        Some(MutationGuard {
            registry: self,
            batch_id: batch_id.clone(),
        })
    }

    pub(crate) fn is_busy(&self, batch_id: &BatchId) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(batch_id)
    }
}

/// Releases the batch on drop: success, error return, panic, or a dropped future
#[derive(Debug)]
pub(crate) struct MutationGuard<'a> {
    registry: &'a MutationRegistry,
    batch_id: BatchId,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.batch_id);
    }
}
