//! Worker dispatch: materialize the manifest, then launch the whole fleet.

use std::sync::Arc;
use tracing::{debug, info};

use crate::collaborators::{WorkerHandle, WorkerLauncher};
use crate::error::{OrchestratorError, Result};
use crate::job::{JobConfig, RunId};
use crate::manifest::{ManifestDigest, WorkerManifest};
use crate::segment::Segment;

/// Result of a dispatch: the running fleet plus the manifest that drove it.
#[derive(Debug)]
pub struct Dispatched {
    /// One handle per segment, in execution order.
    pub handles: Vec<WorkerHandle>,
    /// Digest of the manifest written into the workspace.
    pub manifest_digest: ManifestDigest,
}

/// Builds the worker manifest from the segment plan and launches all
/// workers concurrently through the launch collaborator.
pub struct WorkerDispatcher;

impl WorkerDispatcher {
    /// Dispatch one worker per segment.
    ///
    /// The manifest is rendered and written to the workspace before anything
    /// starts; if that fails, no worker is launched (no partial fleet). The
    /// launch itself is all-or-nothing by the launcher's contract. Dispatch
    /// does not wait for completion.
    pub async fn dispatch(
        config: &JobConfig,
        run_id: RunId,
        segments: &[Segment],
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Result<Dispatched> {
        let manifest = WorkerManifest::from_plan(config, run_id, segments);

        let rendered = manifest
            .render()
            .map_err(|e| OrchestratorError::PlanRender(e.to_string()))?;
        let digest = manifest
            .digest()
            .map_err(|e| OrchestratorError::PlanRender(e.to_string()))?;
        tokio::fs::write(manifest.file_path(), &rendered)
            .await
            .map_err(|e| OrchestratorError::PlanRender(format!("writing manifest: {e}")))?;
        debug!(digest = %digest.short(), path = %manifest.file_path().display(), "manifest written");

        let handles = launcher.launch_all(&manifest).await?;
        info!(workers = handles.len(), digest = %digest.short(), "worker fleet launched");

        Ok(Dispatched {
            handles,
            manifest_digest: digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedLauncher;
    use crate::job::{AssetRef, EngineId, FrameRange, OutputNaming};
    use crate::segment::SegmentPlanner;
    use std::path::Path;

    fn config(workspace: &Path) -> JobConfig {
        JobConfig {
            asset: AssetRef::new("scene.blend"),
            workspace: workspace.to_path_buf(),
            segment_count: 3,
            engine: EngineId::new("blender-4.2"),
            output: OutputNaming::default(),
            remote_prefix: "results/".to_string(),
            assemble_video: false,
            shutdown_host: false,
        }
    }

    #[tokio::test]
    async fn test_dispatch_launches_one_worker_per_segment() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let segments =
            SegmentPlanner::plan(FrameRange::new(1, 100).unwrap(), 3).unwrap();
        let launcher = Arc::new(ScriptedLauncher::new());

        let dispatched =
            WorkerDispatcher::dispatch(&config, RunId::new(), &segments, launcher.clone())
                .await
                .unwrap();

        assert_eq!(dispatched.handles.len(), 3);
        assert_eq!(
            launcher.launched(),
            vec!["frame1".to_string(), "frame2".to_string(), "frame3".to_string()]
        );
        assert!(dir.path().join("manifest.json").exists());
    }

    #[tokio::test]
    async fn test_dispatch_manifest_write_failure_launches_nothing() {
        // Nonexistent workspace directory: the manifest write fails first.
        let config = config(Path::new("/nonexistent/renderfan-workspace"));
        let segments = SegmentPlanner::plan(FrameRange::new(1, 10).unwrap(), 2).unwrap();
        let launcher = Arc::new(ScriptedLauncher::new());

        let err = WorkerDispatcher::dispatch(&config, RunId::new(), &segments, launcher.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::PlanRender(_)));
        assert!(launcher.launched().is_empty(), "no partial fleet");
    }

    #[tokio::test]
    async fn test_dispatch_launch_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let segments = SegmentPlanner::plan(FrameRange::new(1, 10).unwrap(), 2).unwrap();
        let launcher = Arc::new(ScriptedLauncher::new().with_launch_failure("image pull failed"));

        let err = WorkerDispatcher::dispatch(&config, RunId::new(), &segments, launcher)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Launch(_)));
    }
}
