//! Terminal cleanup: tear down workers, purge the workspace, signal host
//! shutdown. Every step is best-effort; the sequence always runs to the end.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collaborators::{HostControl, WorkerLauncher};
use crate::job::JobConfig;

/// Outcome of one cleanup sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub ok: bool,
    /// Failure reason, empty on success.
    pub detail: String,
}

/// Record of the full cleanup sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub steps: Vec<StepOutcome>,
}

impl CleanupReport {
    fn record(&mut self, step: &str, result: crate::error::Result<()>) {
        match result {
            Ok(()) => {
                info!(step, "cleanup step completed");
                self.steps.push(StepOutcome {
                    step: step.to_string(),
                    ok: true,
                    detail: String::new(),
                });
            }
            Err(e) => {
                warn!(step, "cleanup step failed: {e}");
                self.steps.push(StepOutcome {
                    step: step.to_string(),
                    ok: false,
                    detail: e.to_string(),
                });
            }
        }
    }
}

/// The always-run cleanup sequence.
pub struct CleanupStep;

impl CleanupStep {
    /// Run the three cleanup sub-steps in order.
    ///
    /// (a) launcher teardown, (b) workspace purge keeping only the input
    /// asset, (c) host shutdown when configured. A failure in any step never
    /// prevents the next; shutdown is attempted exactly once regardless of
    /// (a) and (b). This method never fails.
    pub async fn run(
        config: &JobConfig,
        launcher: Arc<dyn WorkerLauncher>,
        host: Arc<dyn HostControl>,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        report.record("teardown", launcher.teardown().await);
        report.record(
            "purge_workspace",
            purge_workspace(&config.workspace, config.asset.as_str()).await,
        );

        if config.shutdown_host {
            report.record("shutdown", host.shutdown().await);
        } else {
            info!("host shutdown disabled by configuration");
        }

        report
    }
}

/// Remove all workspace contents except the original input asset.
async fn purge_workspace(workspace: &Path, keep: &str) -> crate::error::Result<()> {
    let mut entries = tokio::fs::read_dir(workspace).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_str() == Some(keep) {
            continue;
        }
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}
