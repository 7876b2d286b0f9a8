//! Pipeline runner: the top-level state machine sequencing fetch, discovery,
//! planning, dispatch, synchronization, collection, publishing, and the
//! always-run cleanup.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::cleanup::{CleanupReport, CleanupStep};
use crate::collaborators::{
    FrameAssembler, HostControl, RenderEngineRuntime, StorageBackend, WorkerLauncher,
};
use crate::collect::{PublishSummary, ResultCollector};
use crate::discover::RangeDiscoverer;
use crate::dispatch::WorkerDispatcher;
use crate::error::{OrchestratorError, Result};
use crate::job::{FrameRange, JobConfig, RunId};
use crate::manifest::ManifestDigest;
use crate::segment::{Segment, SegmentPlanner};
use crate::sync::{RunSynchronizer, WorkerOutcome};

/// Terminal status of a run: the single authoritative outcome signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Success,
    Failed,
}

/// Pipeline stages, in the only order they may occur.
///
/// Transitions are strictly forward; no stage is revisited. Any stage's
/// failure jumps directly to `CleaningUp`, which always runs to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Discovering,
    Planning,
    Dispatching,
    Synchronizing,
    Collecting,
    Publishing,
    CleaningUp,
    Terminated(TerminalStatus),
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Discovering => "discovering",
            Stage::Planning => "planning",
            Stage::Dispatching => "dispatching",
            Stage::Synchronizing => "synchronizing",
            Stage::Collecting => "collecting",
            Stage::Publishing => "publishing",
            Stage::CleaningUp => "cleaning_up",
            Stage::Terminated(TerminalStatus::Success) => "terminated(success)",
            Stage::Terminated(TerminalStatus::Failed) => "terminated(failed)",
        };
        write!(f, "{name}")
    }
}

/// Orchestrator-owned run state. Lives for exactly one job execution and is
/// discarded after cleanup.
#[derive(Debug)]
struct RunState {
    stage: Stage,
    range: Option<FrameRange>,
    segments: Vec<Segment>,
    outcomes: Vec<WorkerOutcome>,
    terminal: bool,
}

impl RunState {
    fn new() -> Self {
        RunState {
            stage: Stage::Idle,
            range: None,
            segments: Vec::new(),
            outcomes: Vec::new(),
            terminal: false,
        }
    }
}

/// Final report of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: TerminalStatus,
    pub range: Option<FrameRange>,
    pub segments: Vec<Segment>,
    pub outcomes: Vec<WorkerOutcome>,
    pub manifest_digest: Option<ManifestDigest>,
    /// Artifacts found in the workspace, lexicographic order.
    pub artifacts: Vec<PathBuf>,
    /// Assembled video artifact, when assembly ran and succeeded.
    pub video: Option<PathBuf>,
    pub publish: PublishSummary,
    pub cleanup: CleanupReport,
    /// Fatal error that ended the run, if any.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == TerminalStatus::Success
    }
}

/// Drives one render job through the pipeline.
pub struct PipelineRunner {
    config: JobConfig,
    storage: Arc<dyn StorageBackend>,
    engine: Arc<dyn RenderEngineRuntime>,
    launcher: Arc<dyn WorkerLauncher>,
    assembler: Arc<dyn FrameAssembler>,
    host: Arc<dyn HostControl>,

    run_id: RunId,
    state: RunState,
    manifest_digest: Option<ManifestDigest>,
    artifacts: Vec<PathBuf>,
    video: Option<PathBuf>,
    publish: PublishSummary,
}

impl PipelineRunner {
    pub fn new(
        config: JobConfig,
        storage: Arc<dyn StorageBackend>,
        engine: Arc<dyn RenderEngineRuntime>,
        launcher: Arc<dyn WorkerLauncher>,
        assembler: Arc<dyn FrameAssembler>,
        host: Arc<dyn HostControl>,
    ) -> Self {
        PipelineRunner {
            config,
            storage,
            engine,
            launcher,
            assembler,
            host,
            run_id: RunId::new(),
            state: RunState::new(),
            manifest_digest: None,
            artifacts: Vec::new(),
            video: None,
            publish: PublishSummary::default(),
        }
    }

    /// Run id assigned at construction.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute the whole pipeline and consume the runner.
    ///
    /// Never returns an error: every failure mode ends in a terminal report,
    /// and cleanup runs regardless of how the forward stages ended.
    pub async fn run(mut self) -> RunReport {
        let started = Instant::now();
        info!(run_id = %self.run_id, asset = %self.config.asset, "starting render run");

        let fatal = match self.drive().await {
            Ok(()) => None,
            Err(e) => {
                error!(run_id = %self.run_id, stage = %self.state.stage, "run failed: {e}");
                Some(e)
            }
        };

        self.advance(Stage::CleaningUp);
        let cleanup = CleanupStep::run(
            &self.config,
            Arc::clone(&self.launcher),
            Arc::clone(&self.host),
        )
        .await;

        let status = if fatal.is_none() {
            TerminalStatus::Success
        } else {
            TerminalStatus::Failed
        };
        self.advance(Stage::Terminated(status));
        self.state.terminal = true;
        info!(run_id = %self.run_id, status = ?status, "run terminated");

        RunReport {
            run_id: self.run_id,
            status,
            range: self.state.range,
            segments: self.state.segments,
            outcomes: self.state.outcomes,
            manifest_digest: self.manifest_digest,
            artifacts: self.artifacts,
            video: self.video,
            publish: self.publish,
            cleanup,
            error: fatal.map(|e| e.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Forward stages only. Returning `Err` short-circuits to cleanup.
    async fn drive(&mut self) -> Result<()> {
        self.advance(Stage::Fetching);
        tokio::fs::create_dir_all(&self.config.workspace).await?;
        let asset_path = self
            .storage
            .fetch(self.config.asset.as_str(), &self.config.workspace)
            .await?;
        info!(path = %asset_path.display(), "asset fetched");

        self.advance(Stage::Discovering);
        let range = RangeDiscoverer::discover(self.engine.as_ref(), &asset_path).await?;
        self.state.range = Some(range);

        self.advance(Stage::Planning);
        let segments = SegmentPlanner::plan(range, self.config.segment_count)?;
        info!(
            requested = self.config.segment_count,
            planned = segments.len(),
            "segment plan ready"
        );
        self.state.segments = segments;

        self.advance(Stage::Dispatching);
        let dispatched = WorkerDispatcher::dispatch(
            &self.config,
            self.run_id.clone(),
            &self.state.segments,
            Arc::clone(&self.launcher),
        )
        .await?;
        self.manifest_digest = Some(dispatched.manifest_digest);

        self.advance(Stage::Synchronizing);
        let report =
            RunSynchronizer::await_all(Arc::clone(&self.launcher), dispatched.handles).await?;
        let failed = report.failed_indices();
        self.state.outcomes = report.outcomes;

        if report.degraded {
            // Degraded runs terminate failed, but whatever the successful
            // segments produced is still collected and published.
            if let Err(e) = self.collect_and_publish().await {
                warn!("artifact handling after degraded run failed: {e}");
            }
            return Err(OrchestratorError::RunDegraded { failed });
        }

        self.collect_and_publish().await
    }

    /// Collecting and Publishing stages, shared by the success and the
    /// degraded paths.
    async fn collect_and_publish(&mut self) -> Result<()> {
        self.advance(Stage::Collecting);
        self.artifacts =
            ResultCollector::collect(&self.config.workspace, &self.config.output).await?;

        if self.config.assemble_video && !self.artifacts.is_empty() {
            let output = self.config.workspace.join("render.mp4");
            self.video =
                ResultCollector::assemble(self.assembler.as_ref(), &self.artifacts, &output)
                    .await;
        }

        self.advance(Stage::Publishing);
        let mut to_publish = self.artifacts.clone();
        if let Some(video) = &self.video {
            to_publish.push(video.clone());
        }
        self.publish =
            ResultCollector::publish(self.storage.as_ref(), &to_publish, &self.config.remote_prefix)
                .await;
        // Partial publish failures are observable but never fatal.
        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        info!(run_id = %self.run_id, from = %self.state.stage, to = %stage, "stage transition");
        self.state.stage = stage;
    }
}
