//! Scan outcome types.

use serde::{Deserialize, Serialize};

/// Verdict of one scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// No threats detected.
    Clean,
    /// At least one threat detected.
    Infected,
    /// The scanner could not produce a verdict.
    Error,
}

/// Result of scanning one job directory. Produced once per completed job
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Verdict of the scan.
    pub status: ScanStatus,
    /// Threat names for infected results, failure description for errors,
    /// `None` when clean.
    pub detail: Option<String>,
    /// Wall-clock duration of the scan in milliseconds.
    pub duration_ms: u64,
    /// Number of files the scanner inspected.
    pub files_scanned: u64,
    /// Number of infected files found.
    pub infected_count: u64,
}

impl ScanResult {
    /// Build a clean verdict.
    #[must_use]
    pub const fn clean(files_scanned: u64, duration_ms: u64) -> Self {
        Self {
            status: ScanStatus::Clean,
            detail: None,
            duration_ms,
            files_scanned,
            infected_count: 0,
        }
    }

    /// Build an infected verdict carrying the joined threat lines.
    #[must_use]
    pub const fn infected(
        detail: Option<String>,
        files_scanned: u64,
        infected_count: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: ScanStatus::Infected,
            detail,
            duration_ms,
            files_scanned,
            infected_count,
        }
    }

    /// Build an error verdict. The pipeline treats these as fail-open.
    #[must_use]
    pub fn error(detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: ScanStatus::Error,
            detail: Some(detail.into()),
            duration_ms,
            files_scanned: 0,
            infected_count: 0,
        }
    }
}
