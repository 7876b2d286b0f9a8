//! Job-level domain types: frame ranges, asset/engine identity, output
//! naming, and the explicit run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};

/// Inclusive frame range of a render job or a single segment.
///
/// The constructor guarantees `start <= end`; a range is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    start: u32,
    end: u32,
}

impl FrameRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(OrchestratorError::Discovery(format!(
                "invalid frame range: start {start} > end {end}"
            )));
        }
        Ok(FrameRange { start, end })
    }

    /// First frame (inclusive).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last frame (inclusive).
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of frames in the range.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false; an empty range cannot be constructed.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for FrameRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Unique identifier for one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run id.
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the input scene asset in the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn new(id: impl Into<String>) -> Self {
        AssetRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the render engine all workers of a run must use.
///
/// The orchestrator never interprets this value; it is passed through to the
/// launch collaborator so every segment renders with the same engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        EngineId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output-artifact naming convention shared by all workers of one run.
///
/// Workers name frames by frame number under a common prefix, so segments
/// never produce colliding filenames and the collector can recognize every
/// artifact belonging to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNaming {
    /// Filename prefix, e.g. `output_`.
    pub prefix: String,
    /// Accepted artifact extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
}

impl OutputNaming {
    pub fn new(prefix: impl Into<String>, extensions: Vec<String>) -> Self {
        OutputNaming {
            prefix: prefix.into(),
            extensions,
        }
    }

    /// Whether a workspace filename belongs to this run's output set.
    pub fn matches(&self, file_name: &str) -> bool {
        if !file_name.starts_with(&self.prefix) {
            return false;
        }
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    /// Filename a worker writes for one frame, e.g. `output_0042.png`.
    pub fn frame_file_name(&self, frame: u32) -> String {
        let ext = self
            .extensions
            .first()
            .map(String::as_str)
            .unwrap_or("png");
        format!("{}{frame:04}.{ext}", self.prefix)
    }
}

impl Default for OutputNaming {
    fn default() -> Self {
        OutputNaming {
            prefix: "output_".to_string(),
            extensions: vec!["png".to_string(), "exr".to_string(), "jpg".to_string()],
        }
    }
}

/// Explicit configuration for one orchestrated run.
///
/// All knobs the original system read from ambient globals live here and are
/// passed into the pipeline runner at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Asset to fetch and render.
    pub asset: AssetRef,

    /// Shared workspace directory all workers write into.
    pub workspace: PathBuf,

    /// Requested number of parallel segments (the planner may emit fewer).
    pub segment_count: usize,

    /// Render engine identity shared by all workers.
    pub engine: EngineId,

    /// Output naming convention shared by all workers.
    pub output: OutputNaming,

    /// Remote key prefix artifacts are published under, e.g. `results/`.
    pub remote_prefix: String,

    /// Whether to mux the rendered frames into a single video artifact.
    pub assemble_video: bool,

    /// Whether cleanup ends with the irreversible host shutdown call.
    pub shutdown_host: bool,
}

impl JobConfig {
    /// Validate the configuration before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(OrchestratorError::InvalidPlanRequest {
                segment_count: self.segment_count,
            });
        }
        Ok(())
    }

    /// Local path of the fetched asset inside the workspace.
    pub fn asset_path(&self) -> PathBuf {
        self.workspace.join(self.asset.as_str())
    }
}
