//! Frame-range discovery via the render engine's introspection mode.

use regex::Regex;
use tracing::{debug, info};

use crate::collaborators::RenderEngineRuntime;
use crate::error::{OrchestratorError, Result};
use crate::job::FrameRange;
use std::path::Path;

/// Extract the frame range from introspection output.
///
/// Engine output is noisy (banners, addon logs, driver warnings), so the
/// **last** line of the form `start-end` wins. Fails with a discovery error
/// when no line matches or the matched values are inverted.
pub fn parse_frame_range(text: &str) -> Result<FrameRange> {
    let pattern = Regex::new(r"^\s*(\d+)\s*-\s*(\d+)\s*$")
        .map_err(|e| OrchestratorError::Discovery(format!("bad range pattern: {e}")))?;

    let captures = text
        .lines()
        .filter_map(|line| pattern.captures(line))
        .last()
        .ok_or_else(|| {
            OrchestratorError::Discovery("no 'start-end' line in introspection output".to_string())
        })?;

    let start: u32 = captures[1]
        .parse()
        .map_err(|e| OrchestratorError::Discovery(format!("bad start frame: {e}")))?;
    let end: u32 = captures[2]
        .parse()
        .map_err(|e| OrchestratorError::Discovery(format!("bad end frame: {e}")))?;

    FrameRange::new(start, end)
}

/// Runs the engine's introspection mode once and parses the result.
///
/// No retries: transient engine failures are the launch collaborator's
/// problem; without a valid range there is nothing to plan.
pub struct RangeDiscoverer;

impl RangeDiscoverer {
    pub async fn discover(
        engine: &dyn RenderEngineRuntime,
        asset_path: &Path,
    ) -> Result<FrameRange> {
        debug!(asset = %asset_path.display(), "running engine introspection");
        let output = engine.introspect(asset_path).await?;
        let range = parse_frame_range(&output)?;
        info!(%range, "frame range detected");
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedEngine;
    use std::path::PathBuf;

    #[test]
    fn test_parse_plain_range() {
        let range = parse_frame_range("1-250").unwrap();
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 250);
    }

    #[test]
    fn test_parse_selects_last_matching_line() {
        let text = "Blender 4.2.0\nRead blend: /work/scene.blend\n10-20\n1-250\n";
        let range = parse_frame_range(text).unwrap();
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 250);
    }

    #[test]
    fn test_parse_tolerates_banner_noise() {
        let text = "GPU driver: 12.1.0\nwarning: color-management\n  1 - 100  \n";
        let range = parse_frame_range(text).unwrap();
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 100);
    }

    #[test]
    fn test_parse_ignores_lines_with_extra_tokens() {
        // A dash inside a log line is not a range line.
        let text = "loading scene-v2.blend\nframes: 1-100 detected\n40-60\n";
        let range = parse_frame_range(text).unwrap();
        assert_eq!(range.start(), 40);
        assert_eq!(range.end(), 60);
    }

    #[test]
    fn test_parse_no_matching_line_fails() {
        let err = parse_frame_range("Blender quit\n").unwrap_err();
        assert!(matches!(err, OrchestratorError::Discovery(_)));
    }

    #[test]
    fn test_parse_inverted_range_fails() {
        let err = parse_frame_range("250-1\n").unwrap_err();
        assert!(matches!(err, OrchestratorError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_discover_via_engine() {
        let engine = ScriptedEngine::new("banner line\n1-48\n");
        let range = RangeDiscoverer::discover(&engine, &PathBuf::from("/work/scene.blend"))
            .await
            .unwrap();
        assert_eq!(range.len(), 48);
    }

    #[tokio::test]
    async fn test_discover_engine_failure_propagates() {
        let engine = ScriptedEngine::failing("docker daemon unreachable");
        let err = RangeDiscoverer::discover(&engine, &PathBuf::from("/work/scene.blend"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Discovery(_)));
    }
}
