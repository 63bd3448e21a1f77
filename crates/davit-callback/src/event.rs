//! Typed callback payloads.
//!
//! The wire format is a tagged JSON object keyed by `eventType`; each
//! variant carries exactly the fields its event needs, so malformed
//! payloads are unrepresentable.

use davit_torrent_core::{JobId, TorrentFileInfo, TransferProgress};
use serde::{Deserialize, Serialize};

/// Fields common to every callback event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Job the event belongs to.
    pub job_id: JobId,
    /// Identifier of the agent instance that produced the event.
    pub worker_id: String,
    /// Receiver-side deduplication token, unique per logical event.
    pub idempotency_key: String,
}

impl EventMeta {
    fn new(job_id: &JobId, worker_id: &str, idempotency_key: String) -> Self {
        Self {
            job_id: job_id.clone(),
            worker_id: worker_id.to_string(),
            idempotency_key,
        }
    }
}

/// Scan verdict carried on terminal callbacks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No threats detected.
    Clean,
    /// At least one threat detected.
    Infected,
    /// The scanner could not produce a verdict.
    Error,
}

/// Scan metadata flattened into terminal callback bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Verdict of the scan.
    pub scan_status: ScanOutcome,
    /// Threat description for infected results, `None` otherwise.
    pub scan_detail: Option<String>,
    /// Wall-clock duration of the scan in milliseconds.
    pub scan_duration_ms: u64,
    /// Number of files the scanner inspected.
    pub files_scanned: u64,
    /// Number of infected files found.
    pub infected_count: u64,
}

/// Callback events, tagged by `eventType` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "snake_case")]
pub enum CallbackEvent {
    /// Periodic progress tick for a running job.
    ProgressUpdate {
        /// Common event fields.
        #[serde(flatten)]
        meta: EventMeta,
        /// Progress snapshot at the time of the tick.
        progress: TransferProgress,
    },
    /// Terminal success: payload downloaded and (fail-open) scanned.
    JobCompleted {
        /// Common event fields.
        #[serde(flatten)]
        meta: EventMeta,
        /// Files found under the job's download directory.
        files: Vec<TorrentFileInfo>,
        /// Scan metadata, flattened into the body when present.
        #[serde(flatten)]
        scan: Option<ScanReport>,
    },
    /// Terminal failure: engine error or infected payload.
    JobFailed {
        /// Common event fields.
        #[serde(flatten)]
        meta: EventMeta,
        /// Human-readable failure description.
        error: String,
        /// Scan metadata when the failure came from the scan gate.
        #[serde(flatten)]
        scan: Option<ScanReport>,
    },
    /// Milestone emitted immediately before the malware scan starts.
    ScanStarted {
        /// Common event fields.
        #[serde(flatten)]
        meta: EventMeta,
    },
}

impl CallbackEvent {
    /// Build a progress tick with a sequence-numbered idempotency key.
    #[must_use]
    pub fn progress(
        job_id: &JobId,
        worker_id: &str,
        sequence: u64,
        progress: TransferProgress,
    ) -> Self {
        Self::ProgressUpdate {
            meta: EventMeta::new(job_id, worker_id, format!("{job_id}-progress-{sequence}")),
            progress,
        }
    }

    /// Build the terminal success event.
    #[must_use]
    pub fn completed(
        job_id: &JobId,
        worker_id: &str,
        files: Vec<TorrentFileInfo>,
        scan: Option<ScanReport>,
    ) -> Self {
        Self::JobCompleted {
            meta: EventMeta::new(job_id, worker_id, format!("{job_id}-completed")),
            files,
            scan,
        }
    }

    /// Build the terminal failure event.
    #[must_use]
    pub fn failed(
        job_id: &JobId,
        worker_id: &str,
        error: impl Into<String>,
        scan: Option<ScanReport>,
    ) -> Self {
        Self::JobFailed {
            meta: EventMeta::new(job_id, worker_id, format!("{job_id}-failed")),
            error: error.into(),
            scan,
        }
    }

    /// Build the pre-scan milestone event.
    #[must_use]
    pub fn scan_started(job_id: &JobId, worker_id: &str) -> Self {
        Self::ScanStarted {
            meta: EventMeta::new(job_id, worker_id, format!("{job_id}-scan-started")),
        }
    }

    /// The event's idempotency key.
    #[must_use]
    pub fn idempotency_key(&self) -> &str {
        &self.meta().idempotency_key
    }

    /// Machine-friendly discriminator, matching the wire `eventType`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProgressUpdate { .. } => "progress_update",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::ScanStarted { .. } => "scan_started",
        }
    }

    fn meta(&self) -> &EventMeta {
        match self {
            Self::ProgressUpdate { meta, .. }
            | Self::JobCompleted { meta, .. }
            | Self::JobFailed { meta, .. }
            | Self::ScanStarted { meta } => meta,
        }
    }
}
