//! End-to-end pipeline runs over the in-memory fakes.

use std::path::Path;
use std::sync::Arc;

use renderfan_core::fakes::{
    MemoryStorage, NoopAssembler, RecordingHost, ScriptedEngine, ScriptedLauncher,
};
use renderfan_core::{
    AssetRef, EngineId, JobConfig, OutputNaming, PipelineRunner, TerminalStatus, WorkerStatus,
};

fn config(workspace: &Path, segments: usize) -> JobConfig {
    JobConfig {
        asset: AssetRef::new("scene.blend"),
        workspace: workspace.to_path_buf(),
        segment_count: segments,
        engine: EngineId::new("blender-4.2"),
        output: OutputNaming::default(),
        remote_prefix: "results/".to_string(),
        assemble_video: false,
        shutdown_host: true,
    }
}

fn seeded_storage() -> MemoryStorage {
    MemoryStorage::new().with_asset("scene.blend", b"blend bytes")
}

fn runner(
    config: JobConfig,
    storage: Arc<MemoryStorage>,
    engine: ScriptedEngine,
    launcher: Arc<ScriptedLauncher>,
    assembler: NoopAssembler,
    host: Arc<RecordingHost>,
) -> PipelineRunner {
    PipelineRunner::new(
        config,
        storage,
        Arc::new(engine),
        launcher,
        Arc::new(assembler),
        host,
    )
}

/// Test: full happy path over range 1-100 split three ways.
#[tokio::test]
async fn test_successful_run() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(seeded_storage());
    let launcher = Arc::new(ScriptedLauncher::new().with_artifact_writing());
    let host = Arc::new(RecordingHost::new());

    let report = runner(
        config(dir.path(), 3),
        storage.clone(),
        ScriptedEngine::new("Blender 4.2.0\n1-100\n"),
        launcher.clone(),
        NoopAssembler::new(),
        host.clone(),
    )
    .run()
    .await;

    assert!(report.succeeded());
    assert_eq!(report.status, TerminalStatus::Success);
    assert!(report.error.is_none());

    // The plan matches ceil(100/3) = 34 frames per segment.
    assert_eq!(report.segments.len(), 3);
    let ranges: Vec<(u32, u32)> = report
        .segments
        .iter()
        .map(|s| (s.range.start(), s.range.end()))
        .collect();
    assert_eq!(ranges, vec![(1, 34), (35, 68), (69, 100)]);

    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes.iter().all(|o| o.passed()));
    assert!(report.manifest_digest.is_some());

    // One artifact per frame, all published.
    assert_eq!(report.artifacts.len(), 100);
    assert_eq!(report.publish.published.len(), 100);
    assert!(report.publish.all_succeeded());
    assert_eq!(storage.published().len(), 100);

    // Cleanup ran: teardown once, workspace purged down to the asset,
    // shutdown signalled once.
    assert_eq!(launcher.teardown_count(), 1);
    assert_eq!(host.shutdown_count(), 1);
    assert!(dir.path().join("scene.blend").exists());
    assert!(!dir.path().join("manifest.json").exists());
    assert!(!dir.path().join("output_0001.png").exists());
}

/// Test: one of three workers fails; the run terminates failed but the two
/// successful segments' artifacts are still collected and published.
#[tokio::test]
async fn test_degraded_run_still_collects_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(seeded_storage());
    let launcher = Arc::new(
        ScriptedLauncher::new()
            .with_artifact_writing()
            .with_failing_segments(&[1]),
    );
    let host = Arc::new(RecordingHost::new());

    let report = runner(
        config(dir.path(), 3),
        storage.clone(),
        ScriptedEngine::new("1-30\n"),
        launcher.clone(),
        NoopAssembler::new(),
        host.clone(),
    )
    .run()
    .await;

    assert_eq!(report.status, TerminalStatus::Failed);
    assert!(report.error.as_deref().unwrap_or("").contains("degraded"));

    let statuses: Vec<WorkerStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            WorkerStatus::Succeeded,
            WorkerStatus::Failed,
            WorkerStatus::Succeeded
        ]
    );

    // Segments 0 and 2 rendered frames 1-10 and 21-30.
    assert_eq!(report.artifacts.len(), 20);
    assert_eq!(report.publish.published.len(), 20);
    assert_eq!(storage.published().len(), 20);

    assert_eq!(launcher.teardown_count(), 1);
    assert_eq!(host.shutdown_count(), 1);
}

/// Test: a fatal failure at every forward stage still runs the full cleanup
/// sequence.
#[tokio::test]
async fn test_cleanup_runs_after_fatal_failure_at_each_stage() {
    // (scenario name, storage, engine, launcher, segment count)
    let scenarios: Vec<(&str, MemoryStorage, ScriptedEngine, ScriptedLauncher, usize)> = vec![
        (
            "fetch",
            MemoryStorage::new(), // asset missing
            ScriptedEngine::new("1-10\n"),
            ScriptedLauncher::new(),
            3,
        ),
        (
            "discover",
            seeded_storage(),
            ScriptedEngine::failing("engine unreachable"),
            ScriptedLauncher::new(),
            3,
        ),
        (
            "plan",
            seeded_storage(),
            ScriptedEngine::new("1-10\n"),
            ScriptedLauncher::new(),
            0, // invalid plan request
        ),
        (
            "dispatch",
            seeded_storage(),
            ScriptedEngine::new("1-10\n"),
            ScriptedLauncher::new().with_launch_failure("image pull failed"),
            3,
        ),
        (
            "synchronize",
            seeded_storage(),
            ScriptedEngine::new("1-10\n"),
            ScriptedLauncher::new().with_failing_segments(&[0, 1, 2]),
            3,
        ),
    ];

    for (name, storage, engine, launcher, segments) in scenarios {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(launcher);
        let host = Arc::new(RecordingHost::new());

        let report = runner(
            config(dir.path(), segments),
            Arc::new(storage),
            engine,
            launcher.clone(),
            NoopAssembler::new(),
            host.clone(),
        )
        .run()
        .await;

        assert_eq!(
            report.status,
            TerminalStatus::Failed,
            "scenario '{name}' must terminate failed"
        );
        assert!(report.error.is_some(), "scenario '{name}' must carry an error");
        assert_eq!(
            launcher.teardown_count(),
            1,
            "scenario '{name}' must tear down workers"
        );
        assert_eq!(
            host.shutdown_count(),
            1,
            "scenario '{name}' must still signal shutdown"
        );
        assert_eq!(
            report.cleanup.steps.len(),
            3,
            "scenario '{name}' must run all cleanup steps"
        );
    }
}

/// Test: a single artifact's publish failure is observable but does not flip
/// the terminal status.
#[tokio::test]
async fn test_partial_publish_failure_keeps_success() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        seeded_storage().with_publish_failure("results/output_0002.png"),
    );
    let launcher = Arc::new(ScriptedLauncher::new().with_artifact_writing());
    let host = Arc::new(RecordingHost::new());

    let report = runner(
        config(dir.path(), 2),
        storage.clone(),
        ScriptedEngine::new("1-4\n"),
        launcher,
        NoopAssembler::new(),
        host,
    )
    .run()
    .await;

    assert!(report.succeeded(), "partial publish failure is non-fatal");
    assert_eq!(report.publish.published.len(), 3);
    assert_eq!(report.publish.failed.len(), 1);
    assert_eq!(report.publish.failed[0].0, "results/output_0002.png");
}

/// Test: assembly failure is reported but the frame artifacts survive and
/// the run still succeeds.
#[tokio::test]
async fn test_assembly_failure_keeps_frame_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(seeded_storage());
    let launcher = Arc::new(ScriptedLauncher::new().with_artifact_writing());
    let host = Arc::new(RecordingHost::new());

    let mut cfg = config(dir.path(), 2);
    cfg.assemble_video = true;

    let report = runner(
        cfg,
        storage.clone(),
        ScriptedEngine::new("1-6\n"),
        launcher,
        NoopAssembler::failing(),
        host,
    )
    .run()
    .await;

    assert!(report.succeeded());
    assert!(report.video.is_none());
    assert_eq!(report.artifacts.len(), 6);
    assert_eq!(report.publish.published.len(), 6);
}

/// Test: successful assembly publishes the video alongside the frames.
#[tokio::test]
async fn test_assembled_video_is_published() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(seeded_storage());
    let launcher = Arc::new(ScriptedLauncher::new().with_artifact_writing());
    let host = Arc::new(RecordingHost::new());

    let mut cfg = config(dir.path(), 2);
    cfg.assemble_video = true;

    let report = runner(
        cfg,
        storage.clone(),
        ScriptedEngine::new("1-6\n"),
        launcher,
        NoopAssembler::new(),
        host,
    )
    .run()
    .await;

    assert!(report.succeeded());
    assert!(report.video.is_some());
    assert_eq!(report.publish.published.len(), 7);
    assert!(storage
        .published()
        .contains(&"results/render.mp4".to_string()));
}

/// Test: shutdown is skipped when the configuration disables it.
#[tokio::test]
async fn test_shutdown_disabled_by_config() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(seeded_storage());
    let launcher = Arc::new(ScriptedLauncher::new().with_artifact_writing());
    let host = Arc::new(RecordingHost::new());

    let mut cfg = config(dir.path(), 2);
    cfg.shutdown_host = false;

    let report = runner(
        cfg,
        storage,
        ScriptedEngine::new("1-4\n"),
        launcher,
        NoopAssembler::new(),
        host.clone(),
    )
    .run()
    .await;

    assert!(report.succeeded());
    assert_eq!(host.shutdown_count(), 0);
}
