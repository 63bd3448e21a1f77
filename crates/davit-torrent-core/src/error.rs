//! Error types for engine operations.

use std::error::Error;

use thiserror::Error;

use crate::model::JobId;

/// Primary error type for download engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A start request failed validation before reaching the engine.
    #[error("invalid start request")]
    InvalidRequest {
        /// Request field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// An operation failed inside the underlying engine.
    #[error("engine operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Job identifier when one is associated with the failure.
        job_id: Option<JobId>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The requested job is not tracked by the engine.
    #[error("job not found")]
    NotFound {
        /// Missing job identifier.
        job_id: JobId,
    },
    /// The background engine worker is gone and can no longer accept commands.
    #[error("engine worker unavailable")]
    WorkerUnavailable {
        /// Operation that could not be enqueued.
        operation: &'static str,
    },
}

/// Convenience alias for engine operation results.
pub type EngineResult<T> = Result<T, EngineError>;
