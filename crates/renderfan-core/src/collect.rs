//! Result collection: scan the shared workspace for run artifacts, optionally
//! assemble them into a video, and publish everything best-effort.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::collaborators::{FrameAssembler, StorageBackend};
use crate::error::Result;
use crate::job::OutputNaming;

/// Outcome of the best-effort publish loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishSummary {
    /// Remote keys published successfully.
    pub published: Vec<String>,
    /// (remote key, reason) for each failed publish.
    pub failed: Vec<(String, String)>,
}

impl PublishSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Gathers per-segment output artifacts and hands them to storage.
pub struct ResultCollector;

impl ResultCollector {
    /// Scan the workspace for files matching the run's naming convention.
    ///
    /// Returned in lexicographic filename order, independent of which worker
    /// produced which file.
    pub async fn collect(workspace: &Path, naming: &OutputNaming) -> Result<Vec<PathBuf>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(workspace).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if naming.matches(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        info!(artifacts = names.len(), "collected run artifacts");
        Ok(names.into_iter().map(|n| workspace.join(n)).collect())
    }

    /// Optional assembly step: mux the ordered frames into one video.
    ///
    /// Failure is reported and swallowed; the frame artifacts stand on their
    /// own.
    pub async fn assemble(
        assembler: &dyn FrameAssembler,
        frames: &[PathBuf],
        output: &Path,
    ) -> Option<PathBuf> {
        match assembler.assemble(frames, output).await {
            Ok(path) => {
                info!(video = %path.display(), "assembled video artifact");
                Some(path)
            }
            Err(e) => {
                warn!("video assembly failed, keeping frame artifacts: {e}");
                None
            }
        }
    }

    /// Publish every artifact under `remote_prefix`, best-effort.
    ///
    /// A single artifact's failure is logged and recorded; the loop always
    /// visits every artifact.
    pub async fn publish(
        storage: &dyn StorageBackend,
        artifacts: &[PathBuf],
        remote_prefix: &str,
    ) -> PublishSummary {
        let mut summary = PublishSummary::default();
        for artifact in artifacts {
            let file_name = artifact
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("artifact");
            let remote_key = format!("{remote_prefix}{file_name}");
            match storage.publish(artifact, &remote_key).await {
                Ok(()) => {
                    info!(key = %remote_key, "published artifact");
                    summary.published.push(remote_key);
                }
                Err(e) => {
                    warn!(key = %remote_key, "publish failed: {e}");
                    summary.failed.push((remote_key, e.to_string()));
                }
            }
        }
        summary
    }
}
