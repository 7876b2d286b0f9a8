//! Collaborator seams the orchestrator depends on.
//!
//! These traits define the external world: storage, the render engine, the
//! worker launcher, the frame assembler, and host control. All are async and
//! implementation-free; in-memory fakes live in the `fakes` module and
//! process-backed defaults in `local`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::manifest::WorkerManifest;
use crate::sync::WorkerOutcome;

/// Handle to one launched worker, returned by `launch_all`.
///
/// Opaque to the orchestrator beyond the segment association; `token` is the
/// launcher's own key for finding the underlying process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    /// Segment this worker renders; outcomes are re-associated through it.
    pub segment_index: usize,
    /// Worker name from the manifest.
    pub name: String,
    /// Launcher-private lookup key.
    pub token: u64,
}

/// Object storage holding the input asset and the published results.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the asset into `dest_dir`, returning the local path.
    /// Fails with a fetch error if the asset is absent or unreadable.
    async fn fetch(&self, asset_id: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Publish a local artifact under `remote_key`.
    /// Failure is per-artifact and non-fatal to the run.
    async fn publish(&self, local: &Path, remote_key: &str) -> Result<()>;
}

/// Render engine capability used for frame-range introspection.
///
/// How the engine provisions its own runtime (container image, toolchain
/// download, GPU setup) is the implementation's concern; the orchestrator
/// only consumes the text output.
#[async_trait]
pub trait RenderEngineRuntime: Send + Sync {
    /// Run introspection against the asset and return the raw text output.
    /// The output may carry banner/log noise before the range line.
    async fn introspect(&self, asset_path: &Path) -> Result<String>;
}

/// Launches and supervises the worker fleet for one run.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Launch every worker declared in the manifest, concurrently.
    /// All-or-nothing: on failure no worker may be left running.
    /// Returns one handle per declared worker, in manifest order.
    async fn launch_all(&self, manifest: &WorkerManifest) -> Result<Vec<WorkerHandle>>;

    /// Block until the worker reaches a terminal state and report it.
    /// Never blocks forever under normal process semantics.
    async fn await_terminal(&self, handle: WorkerHandle) -> Result<WorkerOutcome>;

    /// Tear down launch infrastructure. Best-effort, called once per run.
    async fn teardown(&self) -> Result<()>;
}

/// Optional assembly step: mux ordered frame images into one video artifact.
#[async_trait]
pub trait FrameAssembler: Send + Sync {
    /// Assemble the lexicographically ordered frames into `output`.
    /// Failure does not invalidate the frame artifacts.
    async fn assemble(&self, ordered_frames: &[PathBuf], output: &Path) -> Result<PathBuf>;
}

/// Host-level control for the final, irreversible shutdown call.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Signal host shutdown. Invoked exactly once, at the very end of
    /// cleanup, independent of every other cleanup outcome.
    async fn shutdown(&self) -> Result<()>;
}
