//! Process- and filesystem-backed collaborator implementations.
//!
//! These are the shipping defaults for a single-host deployment: storage is
//! a local directory pair, the engine and workers are external commands, and
//! host shutdown is whatever command the operator configures. Cloud storage
//! or container fleets are external implementations of the same traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborators::{
    FrameAssembler, HostControl, RenderEngineRuntime, StorageBackend, WorkerHandle,
    WorkerLauncher,
};
use crate::error::{OrchestratorError, Result};
use crate::manifest::{WorkerManifest, WorkerSpec};
use crate::sync::WorkerOutcome;

/// Expand `{name}` placeholders in one command argument.
fn substitute(arg: &str, vars: &[(&str, String)]) -> String {
    let mut out = arg.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Run a command to completion with captured output.
async fn run_command(argv: &[String]) -> Result<std::process::Output> {
    let (exe, args) = argv
        .split_first()
        .ok_or_else(|| OrchestratorError::Launch("empty command".to_string()))?;
    let child = Command::new(exe)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    Ok(child.wait_with_output().await?)
}

// ---------------------------------------------------------------------------
// LocalDirStorage
// ---------------------------------------------------------------------------

/// Storage backend over two local directories: assets are fetched from
/// `source_dir`, artifacts are published under `publish_dir`.
#[derive(Debug, Clone)]
pub struct LocalDirStorage {
    source_dir: PathBuf,
    publish_dir: PathBuf,
}

impl LocalDirStorage {
    pub fn new(source_dir: impl Into<PathBuf>, publish_dir: impl Into<PathBuf>) -> Self {
        LocalDirStorage {
            source_dir: source_dir.into(),
            publish_dir: publish_dir.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalDirStorage {
    async fn fetch(&self, asset_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let source = self.source_dir.join(asset_id);
        if !source.is_file() {
            return Err(OrchestratorError::Fetch {
                asset: asset_id.to_string(),
                reason: format!("not found under {}", self.source_dir.display()),
            });
        }
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(asset_id);
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| OrchestratorError::Fetch {
                asset: asset_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(dest)
    }

    async fn publish(&self, local: &Path, remote_key: &str) -> Result<()> {
        let dest = self.publish_dir.join(remote_key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OrchestratorError::Publish {
                    artifact: local.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| OrchestratorError::Publish {
                artifact: local.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProcessEngine
// ---------------------------------------------------------------------------

/// Render engine driven by an external introspection command.
///
/// The command template may reference `{asset}`. How the command provisions
/// the engine (container image, local install) is the operator's choice.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    introspect_command: Vec<String>,
}

impl ProcessEngine {
    pub fn new(introspect_command: Vec<String>) -> Self {
        ProcessEngine { introspect_command }
    }
}

#[async_trait]
impl RenderEngineRuntime for ProcessEngine {
    async fn introspect(&self, asset_path: &Path) -> Result<String> {
        let vars = [("asset", asset_path.display().to_string())];
        let argv: Vec<String> = self
            .introspect_command
            .iter()
            .map(|a| substitute(a, &vars))
            .collect();
        debug!(command = ?argv, "running introspection command");

        let output = run_command(&argv)
            .await
            .map_err(|e| OrchestratorError::Discovery(e.to_string()))?;
        if !output.status.success() {
            return Err(OrchestratorError::Discovery(format!(
                "introspection exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

// ---------------------------------------------------------------------------
// ProcessLauncher
// ---------------------------------------------------------------------------

/// Launches one render process per worker spec as a local child process.
///
/// The render command template may reference `{asset}`, `{start}`, `{end}`,
/// `{workspace}`, and `{name}`. An optional down command is run at teardown
/// (compose-style `down`).
pub struct ProcessLauncher {
    render_command: Vec<String>,
    down_command: Option<Vec<String>>,
    tasks: Mutex<HashMap<u64, JoinHandle<WorkerOutcome>>>,
    next_token: AtomicU64,
}

impl ProcessLauncher {
    pub fn new(render_command: Vec<String>, down_command: Option<Vec<String>>) -> Self {
        ProcessLauncher {
            render_command,
            down_command,
            tasks: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    fn render_argv(&self, manifest: &WorkerManifest, spec: &WorkerSpec) -> Vec<String> {
        let vars = [
            ("asset", manifest.workspace.join(spec.asset.as_str()).display().to_string()),
            ("start", spec.segment.range.start().to_string()),
            ("end", spec.segment.range.end().to_string()),
            ("workspace", manifest.workspace.display().to_string()),
            ("name", spec.segment.name.clone()),
        ];
        self.render_command
            .iter()
            .map(|a| substitute(a, &vars))
            .collect()
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch_all(&self, manifest: &WorkerManifest) -> Result<Vec<WorkerHandle>> {
        if self.render_command.is_empty() {
            return Err(OrchestratorError::Launch("empty render command".to_string()));
        }

        let mut handles = Vec::with_capacity(manifest.workers.len());
        let mut tasks = self.tasks.lock().await;
        for spec in &manifest.workers {
            let token = self.next_token.fetch_add(1, Ordering::SeqCst);
            let index = spec.segment.index;
            let name = spec.segment.name.clone();
            let argv = self.render_argv(manifest, spec);

            debug!(worker = %name, command = ?argv, "spawning render worker");
            let task = tokio::spawn(async move {
                match run_command(&argv).await {
                    Ok(output) if output.status.success() => {
                        WorkerOutcome::succeeded(index, "exit code 0")
                    }
                    Ok(output) => WorkerOutcome::failed(
                        index,
                        format!(
                            "exit code {}: {}",
                            output.status.code().unwrap_or(-1),
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    ),
                    Err(e) => WorkerOutcome::failed(index, e.to_string()),
                }
            });

            tasks.insert(token, task);
            handles.push(WorkerHandle {
                segment_index: index,
                name,
                token,
            });
        }
        info!(workers = handles.len(), "render workers spawned");
        Ok(handles)
    }

    async fn await_terminal(&self, handle: WorkerHandle) -> Result<WorkerOutcome> {
        let task = self
            .tasks
            .lock()
            .await
            .remove(&handle.token)
            .ok_or_else(|| {
                OrchestratorError::Launch(format!("unknown worker handle '{}'", handle.name))
            })?;
        task.await
            .map_err(|e| OrchestratorError::Launch(format!("worker task panicked: {e}")))
    }

    async fn teardown(&self) -> Result<()> {
        // Orphaned tasks from an aborted run are detached, not awaited.
        self.tasks.lock().await.clear();

        if let Some(down) = &self.down_command {
            let output = run_command(down).await.map_err(|e| {
                OrchestratorError::Cleanup {
                    step: "teardown".to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !output.status.success() {
                return Err(OrchestratorError::Cleanup {
                    step: "teardown".to_string(),
                    reason: format!("down command exited with {}", output.status),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandAssembler
// ---------------------------------------------------------------------------

/// Video assembly via an external muxing command (typically ffmpeg).
///
/// The template may reference `{output}` and `{workspace}`; the frame set is
/// implied by the naming convention the command is configured with.
#[derive(Debug, Clone)]
pub struct CommandAssembler {
    assemble_command: Vec<String>,
}

impl CommandAssembler {
    pub fn new(assemble_command: Vec<String>) -> Self {
        CommandAssembler { assemble_command }
    }
}

#[async_trait]
impl FrameAssembler for CommandAssembler {
    async fn assemble(&self, ordered_frames: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let workspace = ordered_frames
            .first()
            .and_then(|p| p.parent())
            .unwrap_or_else(|| Path::new("."));
        let vars = [
            ("output", output.display().to_string()),
            ("workspace", workspace.display().to_string()),
        ];
        let argv: Vec<String> = self
            .assemble_command
            .iter()
            .map(|a| substitute(a, &vars))
            .collect();

        let result = run_command(&argv)
            .await
            .map_err(|e| OrchestratorError::Publish {
                artifact: output.display().to_string(),
                reason: e.to_string(),
            })?;
        if !result.status.success() {
            return Err(OrchestratorError::Publish {
                artifact: output.display().to_string(),
                reason: format!("assembly exited with {}", result.status),
            });
        }
        Ok(output.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// SystemHost
// ---------------------------------------------------------------------------

/// Host control backed by an operator-configured shutdown command.
#[derive(Debug, Clone)]
pub struct SystemHost {
    shutdown_command: Vec<String>,
}

impl SystemHost {
    pub fn new(shutdown_command: Vec<String>) -> Self {
        SystemHost { shutdown_command }
    }
}

#[async_trait]
impl HostControl for SystemHost {
    async fn shutdown(&self) -> Result<()> {
        warn!(command = ?self.shutdown_command, "signalling host shutdown");
        let output = run_command(&self.shutdown_command)
            .await
            .map_err(|e| OrchestratorError::Cleanup {
                step: "shutdown".to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(OrchestratorError::Cleanup {
                step: "shutdown".to_string(),
                reason: format!("shutdown command exited with {}", output.status),
            });
        }
        Ok(())
    }
}
