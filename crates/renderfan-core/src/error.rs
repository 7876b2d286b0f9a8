//! Error taxonomy for the render orchestration pipeline.

use thiserror::Error;

/// Errors produced by the orchestration layer.
///
/// Fatality is decided by the pipeline runner, not here: fetch, discovery,
/// planning, and dispatch errors short-circuit the run; publish and cleanup
/// errors are per-item, best-effort signals that never abort the surrounding
/// sequence.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The input asset could not be fetched from storage.
    #[error("failed to fetch asset '{asset}': {reason}")]
    Fetch { asset: String, reason: String },

    /// Frame-range introspection produced no usable range.
    #[error("frame range discovery failed: {0}")]
    Discovery(String),

    /// A segment plan was requested with an unusable segment count.
    #[error("invalid plan request: segment count must be >= 1, got {segment_count}")]
    InvalidPlanRequest { segment_count: usize },

    /// The worker manifest could not be materialized; no workers were started.
    #[error("failed to render worker manifest: {0}")]
    PlanRender(String),

    /// The launch collaborator failed to start the worker fleet.
    #[error("worker launch failed: {0}")]
    Launch(String),

    /// One or more workers reached a failed terminal state.
    #[error("run degraded: worker(s) for segment(s) {failed:?} failed")]
    RunDegraded { failed: Vec<usize> },

    /// A single artifact could not be published. Non-fatal to the run.
    #[error("failed to publish artifact '{artifact}': {reason}")]
    Publish { artifact: String, reason: String },

    /// A cleanup sub-step failed. Logged only; never aborts cleanup.
    #[error("cleanup step '{step}' failed: {reason}")]
    Cleanup { step: String, reason: String },

    /// Workspace or manifest I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or report serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_displays_asset_and_reason() {
        let err = OrchestratorError::Fetch {
            asset: "scene.blend".to_string(),
            reason: "object not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("scene.blend"));
        assert!(msg.contains("object not found"));
    }

    #[test]
    fn test_invalid_plan_request_displays_count() {
        let err = OrchestratorError::InvalidPlanRequest { segment_count: 0 };
        assert!(err.to_string().contains("got 0"));
    }

    #[test]
    fn test_run_degraded_displays_failed_indices() {
        let err = OrchestratorError::RunDegraded { failed: vec![1, 4] };
        let msg = err.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_cleanup_error_names_step() {
        let err = OrchestratorError::Cleanup {
            step: "teardown".to_string(),
            reason: "compose down exited 1".to_string(),
        };
        assert!(err.to_string().contains("teardown"));
    }
}
