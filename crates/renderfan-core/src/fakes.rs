//! In-memory fakes for collaborator traits (testing and dry runs).
//!
//! Provides `MemoryStorage`, `ScriptedEngine`, `ScriptedLauncher`,
//! `NoopAssembler`, and `RecordingHost` that satisfy the trait contracts
//! without any external process or network.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{
    FrameAssembler, HostControl, RenderEngineRuntime, StorageBackend, WorkerHandle,
    WorkerLauncher,
};
use crate::error::{OrchestratorError, Result};
use crate::manifest::WorkerManifest;
use crate::sync::WorkerOutcome;

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory storage backend: seeded assets, recorded publishes, and
/// per-key scripted publish failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    published: Mutex<Vec<String>>,
    fail_publish_keys: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an asset that `fetch` will materialize on disk.
    pub fn with_asset(self, asset_id: &str, bytes: &[u8]) -> Self {
        self.assets
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), bytes.to_vec());
        self
    }

    /// Make `publish` fail for an exact remote key.
    pub fn with_publish_failure(self, remote_key: &str) -> Self {
        self.fail_publish_keys
            .lock()
            .unwrap()
            .insert(remote_key.to_string());
        self
    }

    /// Remote keys successfully published so far.
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn fetch(&self, asset_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let bytes = self
            .assets
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::Fetch {
                asset: asset_id.to_string(),
                reason: "asset not found".to_string(),
            })?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(asset_id);
        tokio::fs::write(&dest, bytes).await?;
        Ok(dest)
    }

    async fn publish(&self, local: &Path, remote_key: &str) -> Result<()> {
        if self.fail_publish_keys.lock().unwrap().contains(remote_key) {
            return Err(OrchestratorError::Publish {
                artifact: local.display().to_string(),
                reason: "scripted publish failure".to_string(),
            });
        }
        self.published.lock().unwrap().push(remote_key.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedEngine
// ---------------------------------------------------------------------------

/// Engine fake returning canned introspection output (or a canned error).
#[derive(Debug)]
pub struct ScriptedEngine {
    output: std::result::Result<String, String>,
}

impl ScriptedEngine {
    pub fn new(output: impl Into<String>) -> Self {
        ScriptedEngine {
            output: Ok(output.into()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        ScriptedEngine {
            output: Err(reason.into()),
        }
    }
}

#[async_trait]
impl RenderEngineRuntime for ScriptedEngine {
    async fn introspect(&self, _asset_path: &Path) -> Result<String> {
        match &self.output {
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(OrchestratorError::Discovery(reason.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedLauncher
// ---------------------------------------------------------------------------

/// Launcher fake with scripted per-segment outcomes and completion order.
///
/// When artifact writing is enabled, `launch_all` renders each successful
/// worker's frames instantly: one file per frame under the manifest's
/// naming convention, inside the manifest's workspace.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    fail_segments: HashSet<usize>,
    wait_error_segments: HashSet<usize>,
    reverse_completion: bool,
    launch_failure: Option<String>,
    write_artifacts: bool,
    teardown_calls: AtomicUsize,
    launched: Mutex<Vec<String>>,
}

impl ScriptedLauncher {
    /// All workers succeed, no artifacts written.
    pub fn new() -> Self {
        Self::default()
    }

    /// Workers for these segment indices exit failed.
    pub fn with_failing_segments(mut self, indices: &[usize]) -> Self {
        self.fail_segments = indices.iter().copied().collect();
        self
    }

    /// `await_terminal` itself errors for these segment indices.
    pub fn with_wait_error_segments(mut self, indices: &[usize]) -> Self {
        self.wait_error_segments = indices.iter().copied().collect();
        self
    }

    /// Later-submitted workers finish first.
    pub fn with_reverse_completion(mut self) -> Self {
        self.reverse_completion = true;
        self
    }

    /// `launch_all` fails before any worker starts.
    pub fn with_launch_failure(mut self, reason: impl Into<String>) -> Self {
        self.launch_failure = Some(reason.into());
        self
    }

    /// Successful workers write their frame files into the workspace.
    pub fn with_artifact_writing(mut self) -> Self {
        self.write_artifacts = true;
        self
    }

    /// Worker names passed to `launch_all`, in manifest order.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    /// Number of `teardown` calls observed.
    pub fn teardown_count(&self) -> usize {
        self.teardown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerLauncher for ScriptedLauncher {
    async fn launch_all(&self, manifest: &WorkerManifest) -> Result<Vec<WorkerHandle>> {
        if let Some(reason) = &self.launch_failure {
            return Err(OrchestratorError::Launch(reason.clone()));
        }

        let mut handles = Vec::with_capacity(manifest.workers.len());
        for spec in &manifest.workers {
            let index = spec.segment.index;
            self.launched.lock().unwrap().push(spec.segment.name.clone());

            if self.write_artifacts && !self.fail_segments.contains(&index) {
                tokio::fs::create_dir_all(&manifest.workspace).await?;
                for frame in spec.segment.range.start()..=spec.segment.range.end() {
                    let file = manifest.workspace.join(spec.output.frame_file_name(frame));
                    tokio::fs::write(&file, format!("frame {frame}")).await?;
                }
            }

            handles.push(WorkerHandle {
                segment_index: index,
                name: spec.segment.name.clone(),
                token: index as u64,
            });
        }
        Ok(handles)
    }

    async fn await_terminal(&self, handle: WorkerHandle) -> Result<WorkerOutcome> {
        if self.reverse_completion {
            // Earlier segments take longer, so completions arrive reversed.
            let delay = 5 * (8u64.saturating_sub(handle.segment_index as u64));
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.wait_error_segments.contains(&handle.segment_index) {
            return Err(OrchestratorError::Launch(format!(
                "lost contact with worker '{}'",
                handle.name
            )));
        }

        if self.fail_segments.contains(&handle.segment_index) {
            Ok(WorkerOutcome::failed(handle.segment_index, "exit code 1"))
        } else {
            Ok(WorkerOutcome::succeeded(handle.segment_index, "exit code 0"))
        }
    }

    async fn teardown(&self) -> Result<()> {
        self.teardown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher fake whose `teardown` fails; everything else succeeds.
#[derive(Debug, Default)]
pub struct FailingTeardownLauncher {
    inner: ScriptedLauncher,
}

impl FailingTeardownLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teardown_count(&self) -> usize {
        self.inner.teardown_count()
    }
}

#[async_trait]
impl WorkerLauncher for FailingTeardownLauncher {
    async fn launch_all(&self, manifest: &WorkerManifest) -> Result<Vec<WorkerHandle>> {
        self.inner.launch_all(manifest).await
    }

    async fn await_terminal(&self, handle: WorkerHandle) -> Result<WorkerOutcome> {
        self.inner.await_terminal(handle).await
    }

    async fn teardown(&self) -> Result<()> {
        self.inner.teardown_calls.fetch_add(1, Ordering::SeqCst);
        Err(OrchestratorError::Cleanup {
            step: "teardown".to_string(),
            reason: "scripted teardown failure".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// NoopAssembler
// ---------------------------------------------------------------------------

/// Assembler fake: writes an empty video artifact (or fails when scripted).
#[derive(Debug, Default)]
pub struct NoopAssembler {
    fail: bool,
    assembled: Mutex<Vec<usize>>,
}

impl NoopAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        NoopAssembler {
            fail: true,
            assembled: Mutex::new(Vec::new()),
        }
    }

    /// Frame counts of the assemble calls observed.
    pub fn assembled(&self) -> Vec<usize> {
        self.assembled.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameAssembler for NoopAssembler {
    async fn assemble(&self, ordered_frames: &[PathBuf], output: &Path) -> Result<PathBuf> {
        if self.fail {
            return Err(OrchestratorError::Publish {
                artifact: output.display().to_string(),
                reason: "scripted assembly failure".to_string(),
            });
        }
        self.assembled.lock().unwrap().push(ordered_frames.len());
        tokio::fs::write(output, b"").await?;
        Ok(output.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// RecordingHost
// ---------------------------------------------------------------------------

/// Host-control fake that counts shutdown calls (and can fail them).
#[derive(Debug, Default)]
pub struct RecordingHost {
    fail: bool,
    shutdown_calls: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        RecordingHost {
            fail: true,
            shutdown_calls: AtomicUsize::new(0),
        }
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostControl for RecordingHost {
    async fn shutdown(&self) -> Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OrchestratorError::Cleanup {
                step: "shutdown".to_string(),
                reason: "scripted shutdown failure".to_string(),
            });
        }
        Ok(())
    }
}
