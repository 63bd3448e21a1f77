//! Error types for job admission.

use davit_torrent_core::JobId;
use thiserror::Error;

/// Failures surfaced when admitting a job into the pipeline.
///
/// Execution failures never appear here: a launched pipeline reports them
/// through callbacks and the registry, not through return values.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A job with the same identifier is still active.
    #[error("job already active")]
    Conflict {
        /// Conflicting job identifier.
        job_id: JobId,
    },
}
