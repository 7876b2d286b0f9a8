//! Worker manifest: the derived, disposable declarative description of one
//! run's parallel workers.
//!
//! Regenerated from scratch every run and written into the workspace so the
//! cleanup purge removes it with the rest of the derived state. Never
//! hand-edited; the manifest and the in-memory segment plan cannot diverge
//! because both come from the same `plan` call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::job::{AssetRef, EngineId, JobConfig, OutputNaming, RunId};
use crate::segment::Segment;

/// Launch descriptor for one segment's worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// The segment this worker renders.
    pub segment: Segment,
    /// Shared input asset.
    pub asset: AssetRef,
    /// Shared engine identity.
    pub engine: EngineId,
    /// Shared output naming convention.
    pub output: OutputNaming,
}

impl WorkerSpec {
    pub fn from_segment(config: &JobConfig, segment: Segment) -> Self {
        WorkerSpec {
            segment,
            asset: config.asset.clone(),
            engine: config.engine.clone(),
            output: config.output.clone(),
        }
    }
}

/// Content digest (SHA-256 hex) of a rendered manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestDigest(String);

impl ManifestDigest {
    fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        ManifestDigest(hex::encode(hasher.finalize()))
    }

    /// Full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ManifestDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declarative description of all workers for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerManifest {
    /// Run this manifest belongs to.
    pub run_id: RunId,
    /// Shared input asset.
    pub asset: AssetRef,
    /// Shared engine identity.
    pub engine: EngineId,
    /// Workspace directory all workers mount/write into.
    pub workspace: PathBuf,
    /// One spec per planned segment, in execution order.
    pub workers: Vec<WorkerSpec>,
}

impl WorkerManifest {
    /// Build the manifest 1:1 from a segment plan.
    pub fn from_plan(config: &JobConfig, run_id: RunId, segments: &[Segment]) -> Self {
        WorkerManifest {
            run_id,
            asset: config.asset.clone(),
            engine: config.engine.clone(),
            workspace: config.workspace.clone(),
            workers: segments
                .iter()
                .map(|s| WorkerSpec::from_segment(config, s.clone()))
                .collect(),
        }
    }

    /// Render to pretty JSON for writing into the workspace.
    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Content digest of the rendered manifest.
    ///
    /// Logged and embedded in the run report so a run can be associated with
    /// the exact manifest that drove it.
    pub fn digest(&self) -> Result<ManifestDigest> {
        Ok(ManifestDigest::from_bytes(self.render()?.as_bytes()))
    }

    /// Workspace path the manifest is written to.
    pub fn file_path(&self) -> PathBuf {
        self.workspace.join("manifest.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FrameRange;
    use crate::segment::SegmentPlanner;

    fn config() -> JobConfig {
        JobConfig {
            asset: AssetRef::new("scene.blend"),
            workspace: PathBuf::from("./work"),
            segment_count: 3,
            engine: EngineId::new("blender-4.2"),
            output: OutputNaming::default(),
            remote_prefix: "results/".to_string(),
            assemble_video: false,
            shutdown_host: false,
        }
    }

    fn manifest(run_id: &str, end: u32, segments: usize) -> WorkerManifest {
        let plan =
            SegmentPlanner::plan(FrameRange::new(1, end).unwrap(), segments).unwrap();
        WorkerManifest::from_plan(&config(), RunId(run_id.to_string()), &plan)
    }

    #[test]
    fn test_manifest_mirrors_plan() {
        let m = manifest("run-1", 100, 3);
        assert_eq!(m.workers.len(), 3);
        assert_eq!(m.workers[0].segment.name, "frame1");
        assert_eq!(m.workers[2].segment.range.end(), 100);
        for w in &m.workers {
            assert_eq!(w.asset, AssetRef::new("scene.blend"));
            assert_eq!(w.engine, EngineId::new("blender-4.2"));
        }
    }

    #[test]
    fn test_manifest_round_trips_through_json() {
        let m = manifest("run-1", 100, 3);
        let rendered = m.render().unwrap();
        let parsed: WorkerManifest = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn test_digest_stable_for_identical_input() {
        let a = manifest("run-1", 100, 3).digest().unwrap();
        let b = manifest("run-1", 100, 3).digest().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_digest_changes_when_plan_changes() {
        let a = manifest("run-1", 100, 3).digest().unwrap();
        let b = manifest("run-1", 100, 4).digest().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_path_is_inside_workspace() {
        let m = manifest("run-1", 10, 2);
        assert_eq!(m.file_path(), PathBuf::from("./work/manifest.json"));
    }
}
