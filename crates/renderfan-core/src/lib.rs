//! renderfan-core — parallel batch-render orchestration.
//!
//! Splits one render job's frame range into contiguous segments, dispatches
//! each to an isolated worker, barriers on the whole fleet, then collects,
//! optionally assembles, and publishes the results. The pipeline is a single
//! linear run: Fetch → Discover → Plan → Dispatch → Synchronize → Collect →
//! Publish → Cleanup, with cleanup guaranteed regardless of where a run
//! fails.
//!
//! Storage, the render engine, the worker launcher, the assembler, and host
//! control are trait seams (`collaborators`); in-memory fakes back the tests
//! and process/directory implementations (`local`) back a single-host
//! deployment.

pub mod cleanup;
pub mod collaborators;
pub mod collect;
pub mod discover;
pub mod dispatch;
pub mod error;
pub mod fakes;
pub mod job;
pub mod local;
pub mod manifest;
pub mod pipeline;
pub mod segment;
pub mod sync;
pub mod telemetry;

// Re-export key types
pub use cleanup::{CleanupReport, CleanupStep, StepOutcome};
pub use collaborators::{
    FrameAssembler, HostControl, RenderEngineRuntime, StorageBackend, WorkerHandle,
    WorkerLauncher,
};
pub use collect::{PublishSummary, ResultCollector};
pub use discover::{parse_frame_range, RangeDiscoverer};
pub use dispatch::{Dispatched, WorkerDispatcher};
pub use error::{OrchestratorError, Result};
pub use job::{AssetRef, EngineId, FrameRange, JobConfig, OutputNaming, RunId};
pub use manifest::{ManifestDigest, WorkerManifest, WorkerSpec};
pub use pipeline::{PipelineRunner, RunReport, Stage, TerminalStatus};
pub use segment::{Segment, SegmentPlanner};
pub use sync::{RunSynchronizer, SyncReport, WorkerOutcome, WorkerStatus};
pub use telemetry::init_tracing;
