//! Malware scanning gate for completed downloads.
//!
//! The scanner runs as an external process over a job's download directory
//! and reports a typed verdict. The integration is deliberately infallible
//! at the trait level: a missing binary, an internal scanner failure, or a
//! timeout all fold into a [`ScanStatus::Error`] result, leaving the
//! fail-open decision to the pipeline.

use std::path::Path;

use async_trait::async_trait;

mod clamav;
mod model;

pub use clamav::{ClamAvScanner, SCAN_TIMEOUT};
pub use model::{ScanResult, ScanStatus};

/// Capability trait for the malware scan step.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan a directory tree and report the outcome.
    ///
    /// Never fails: every failure mode is expressed through
    /// [`ScanStatus::Error`] in the returned result.
    async fn scan(&self, dir: &Path) -> ScanResult;
}
