use std::sync::Arc;

use super::scan::{ScanDispatcher, ScanError, ScanReport};
use crate::db::{JobRecordStore, StoreError};

/// Batch-wide state derived from the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// At least one job is still `IN_PROGRESS`.
    Outstanding,
    /// No job is `IN_PROGRESS`.
    Complete,
}

#[derive(Debug)]
pub enum GateOutcome {
    Outstanding,
    Dispatched(ScanReport),
}

/// Decides after each job transition whether the batch is done, and if so
/// runs the scan dispatcher.
///
/// Evaluation and dispatch are not atomic against the store: two jobs that
/// finish together can both observe `Complete` and both dispatch. Duplicate
/// submissions are tolerated and `mark_scanned` is idempotent.
pub struct BatchGate {
    store: Arc<dyn JobRecordStore>,
    dispatcher: ScanDispatcher,
}

impl BatchGate {
    pub fn new(store: Arc<dyn JobRecordStore>, dispatcher: ScanDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn state(&self) -> Result<BatchState, StoreError> {
        if self.store.has_outstanding().await? {
            Ok(BatchState::Outstanding)
        } else {
            Ok(BatchState::Complete)
        }
    }

    pub async fn evaluate(&self) -> Result<GateOutcome, ScanError> {
        match self.state().await? {
            BatchState::Outstanding => {
                tracing::debug!("Jobs still in progress, scan deferred");
                Ok(GateOutcome::Outstanding)
            }
            BatchState::Complete => {
                tracing::info!("No jobs in progress, dispatching classification scan");
                let report = self.dispatcher.dispatch().await?;
                Ok(GateOutcome::Dispatched(report))
            }
        }
    }
}
