//! Job pipeline: the orchestration layer between the HTTP control surface
//! and the download engine.
//!
//! A launched job runs as a detached task that consumes the engine's
//! progress stream, posts signed callbacks per tick, and on completion
//! walks the payload, runs the malware scan, and finalises the registry
//! entry. The scan gate is fail-open: only an `infected` verdict blocks
//! delivery; a broken or missing scanner is reported as metadata and the
//! job still completes.

pub mod error;
mod files;
pub mod pipeline;
pub mod registry;

pub use error::PipelineError;
pub use files::collect_files;
pub use pipeline::{JobPipeline, JobRequest, JobStatusView};
pub use registry::{JobRegistry, JobSnapshot, JobStatus};
