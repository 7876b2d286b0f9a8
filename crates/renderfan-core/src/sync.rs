//! Barrier synchronization: wait for every worker to reach a terminal state
//! and report outcomes in segment order.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::collaborators::{WorkerHandle, WorkerLauncher};
use crate::error::Result;

/// Terminal status of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Succeeded,
    Failed,
}

/// Result of one worker's execution, read-only once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutcome {
    /// Index of the segment this worker rendered.
    pub segment_index: usize,
    /// Terminal status.
    pub status: WorkerStatus,
    /// Exit code / error text as reported by the launcher.
    pub exit_detail: String,
    /// When the terminal state was observed.
    pub finished_at: DateTime<Utc>,
}

impl WorkerOutcome {
    pub fn succeeded(segment_index: usize, exit_detail: impl Into<String>) -> Self {
        WorkerOutcome {
            segment_index,
            status: WorkerStatus::Succeeded,
            exit_detail: exit_detail.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn failed(segment_index: usize, exit_detail: impl Into<String>) -> Self {
        WorkerOutcome {
            segment_index,
            status: WorkerStatus::Failed,
            exit_detail: exit_detail.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == WorkerStatus::Succeeded
    }
}

/// Aggregate result of the synchronization barrier.
///
/// Whether `degraded` is fatal is the pipeline runner's decision; the
/// synchronizer only observes and aggregates.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// One outcome per worker, ordered by segment index.
    pub outcomes: Vec<WorkerOutcome>,
    /// True when at least one worker failed.
    pub degraded: bool,
}

impl SyncReport {
    /// Indices of the segments whose workers failed.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| !o.passed())
            .map(|o| o.segment_index)
            .collect()
    }
}

/// Full-barrier worker synchronizer.
pub struct RunSynchronizer;

impl RunSynchronizer {
    /// Wait for every worker to reach a terminal state.
    ///
    /// Workers complete in non-deterministic wall-clock order; outcomes are
    /// re-associated to their segment index and returned in submission
    /// order. A failing worker never cancels its siblings; the barrier holds
    /// until the whole fleet is terminal.
    pub async fn await_all(
        launcher: Arc<dyn WorkerLauncher>,
        handles: Vec<WorkerHandle>,
    ) -> Result<SyncReport> {
        let waiters = handles.into_iter().map(|handle| {
            let launcher = Arc::clone(&launcher);
            async move {
                let index = handle.segment_index;
                let name = handle.name.clone();
                match launcher.await_terminal(handle).await {
                    Ok(outcome) => outcome,
                    // A wait failure is a terminal failure for that worker.
                    Err(e) => {
                        warn!(worker = %name, "failed to observe worker exit: {e}");
                        WorkerOutcome::failed(index, e.to_string())
                    }
                }
            }
        });

        let mut outcomes = join_all(waiters).await;
        outcomes.sort_by_key(|o| o.segment_index);

        let degraded = outcomes.iter().any(|o| !o.passed());
        if degraded {
            let failed: Vec<usize> = outcomes
                .iter()
                .filter(|o| !o.passed())
                .map(|o| o.segment_index)
                .collect();
            warn!(?failed, "one or more workers failed");
        } else {
            info!(workers = outcomes.len(), "all workers completed successfully");
        }

        Ok(SyncReport { outcomes, degraded })
    }
}
