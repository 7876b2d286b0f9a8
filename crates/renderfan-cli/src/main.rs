//! renderfan — parallel batch-render orchestration CLI.
//!
//! The `renderfan run` command fetches a scene asset, discovers its frame
//! range, splits it into segments, renders them in parallel workers, and
//! publishes the results. `--dry-run` exercises the whole pipeline against
//! in-memory fakes to preview a plan.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

use renderfan_core::fakes::{
    MemoryStorage, NoopAssembler, RecordingHost, ScriptedEngine, ScriptedLauncher,
};
use renderfan_core::local::{
    CommandAssembler, LocalDirStorage, ProcessEngine, ProcessLauncher, SystemHost,
};
use renderfan_core::{
    AssetRef, EngineId, JobConfig, OutputNaming, PipelineRunner, RunReport,
};

#[derive(Parser)]
#[command(name = "renderfan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel batch-render orchestration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one job: split its frame range and run the segments in parallel
    Run {
        /// Asset id (filename) of the scene to render
        #[arg(long)]
        asset: String,

        /// Directory assets are fetched from
        #[arg(long, default_value = "./assets")]
        source_dir: PathBuf,

        /// Directory artifacts are published into
        #[arg(long, default_value = "./published")]
        publish_dir: PathBuf,

        /// Shared workspace directory for this run
        #[arg(long, default_value = "./work")]
        workspace: PathBuf,

        /// Number of parallel segments to plan
        #[arg(long, default_value = "3")]
        segments: usize,

        /// Render engine identity recorded in the manifest
        #[arg(long, default_value = "blender")]
        engine: String,

        /// Remote key prefix artifacts are published under
        #[arg(long, default_value = "results/")]
        remote_prefix: String,

        /// Introspection command; may reference {asset}
        #[arg(long)]
        introspect_command: Option<String>,

        /// Per-worker render command; may reference {asset} {start} {end} {workspace} {name}
        #[arg(long)]
        render_command: Option<String>,

        /// Teardown command run once at cleanup
        #[arg(long)]
        down_command: Option<String>,

        /// Assembly (mux) command; may reference {output} {workspace}
        #[arg(long)]
        assemble_command: Option<String>,

        /// Host shutdown command, run as the final cleanup action
        #[arg(long)]
        shutdown_command: Option<String>,

        /// Mux the rendered frames into a single video artifact
        #[arg(long)]
        assemble: bool,

        /// Frame count assumed by --dry-run's fake engine
        #[arg(long, default_value = "100")]
        dry_run_frames: u32,

        /// Run the pipeline against in-memory fakes instead of processes
        #[arg(long)]
        dry_run: bool,
    },
}

/// Split a command string on whitespace into argv form.
fn argv(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("run:       {}", report.run_id);
        println!(
            "status:    {}",
            if report.succeeded() { "success" } else { "failed" }
        );
        if let Some(range) = &report.range {
            println!("range:     {range}");
        }
        for segment in &report.segments {
            println!("segment:   {} -> {}", segment.name, segment.range);
        }
        println!(
            "artifacts: {} collected, {} published, {} failed",
            report.artifacts.len(),
            report.publish.published.len(),
            report.publish.failed.len()
        );
        if let Some(error) = &report.error {
            println!("error:     {error}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    config: JobConfig,
    source_dir: PathBuf,
    publish_dir: PathBuf,
    introspect_command: Option<String>,
    render_command: Option<String>,
    down_command: Option<String>,
    assemble_command: Option<String>,
    shutdown_command: Option<String>,
    dry_run: bool,
    dry_run_frames: u32,
    json: bool,
) -> Result<()> {
    config.validate().context("invalid job configuration")?;

    let report = if dry_run {
        info!("dry run: wiring in-memory collaborators");
        let storage =
            MemoryStorage::new().with_asset(config.asset.as_str(), b"dry-run asset");
        let engine = ScriptedEngine::new(format!("1-{dry_run_frames}\n"));
        let launcher = ScriptedLauncher::new().with_artifact_writing();
        PipelineRunner::new(
            config,
            Arc::new(storage),
            Arc::new(engine),
            Arc::new(launcher),
            Arc::new(NoopAssembler::new()),
            Arc::new(RecordingHost::new()),
        )
        .run()
        .await
    } else {
        let introspect = introspect_command
            .context("--introspect-command is required unless --dry-run is set")?;
        let render =
            render_command.context("--render-command is required unless --dry-run is set")?;
        if config.assemble_video && assemble_command.is_none() {
            bail!("--assemble-command is required when --assemble is set");
        }

        let storage = LocalDirStorage::new(source_dir, publish_dir);
        let engine = ProcessEngine::new(argv(&introspect));
        let launcher =
            ProcessLauncher::new(argv(&render), down_command.as_deref().map(argv));
        let assembler = CommandAssembler::new(
            assemble_command.as_deref().map(argv).unwrap_or_default(),
        );
        let host = SystemHost::new(
            shutdown_command
                .as_deref()
                .map(argv)
                .unwrap_or_else(|| vec!["true".to_string()]),
        );
        PipelineRunner::new(
            config,
            Arc::new(storage),
            Arc::new(engine),
            Arc::new(launcher),
            Arc::new(assembler),
            Arc::new(host),
        )
        .run()
        .await
    };

    print_report(&report, json)?;
    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    renderfan_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            asset,
            source_dir,
            publish_dir,
            workspace,
            segments,
            engine,
            remote_prefix,
            introspect_command,
            render_command,
            down_command,
            assemble_command,
            shutdown_command,
            assemble,
            dry_run_frames,
            dry_run,
        } => {
            let config = JobConfig {
                asset: AssetRef::new(asset),
                workspace,
                segment_count: segments,
                engine: EngineId::new(engine),
                output: OutputNaming::default(),
                remote_prefix,
                assemble_video: assemble,
                shutdown_host: shutdown_command.is_some(),
            };
            cmd_run(
                config,
                source_dir,
                publish_dir,
                introspect_command,
                render_command,
                down_command,
                assemble_command,
                shutdown_command,
                dry_run,
                dry_run_frames,
                cli.json,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_splits_on_whitespace() {
        assert_eq!(
            argv("blender -b {asset} -s {start} -e {end} -a"),
            vec!["blender", "-b", "{asset}", "-s", "{start}", "-e", "{end}", "-a"]
        );
        assert!(argv("").is_empty());
    }
}
