//! Core download domain types shared across the workspace.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{EngineError, EngineResult};

/// Maximum accepted length for a job identifier.
const JOB_ID_MAX_LEN: usize = 128;

/// Validated job identifier assigned by the control plane.
///
/// The identifier doubles as the name of the job's download directory, so
/// construction rejects anything that is not a safe single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

/// Rejection produced when a job identifier fails validation.
#[derive(Debug, Error)]
#[error("invalid job id")]
pub struct InvalidJobId {
    /// Offending value as received.
    pub value: String,
    /// Machine-readable reason for the rejection.
    pub reason: &'static str,
}

impl JobId {
    /// Validate and wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidJobId`] when the value is empty, longer than 128
    /// bytes, or contains characters outside `[A-Za-z0-9._-]`.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidJobId> {
        let value = value.into();
        if value.is_empty() {
            return Err(InvalidJobId {
                value,
                reason: "empty",
            });
        }
        if value.len() > JOB_ID_MAX_LEN {
            return Err(InvalidJobId {
                value,
                reason: "too_long",
            });
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        {
            return Err(InvalidJobId {
                value,
                reason: "forbidden_characters",
            });
        }
        Ok(Self(value))
    }

    /// View the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

/// Source describing how a transfer should be admitted into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentSource {
    /// A magnet URI to resolve and download.
    Magnet {
        /// Magnet URI, including the `magnet:` scheme.
        uri: String,
    },
    /// Raw `.torrent` metainfo bytes.
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSource {
    /// Convenience constructor for magnet-based sources.
    #[must_use]
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    /// Convenience constructor for metainfo-based sources.
    #[must_use]
    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Metainfo {
            bytes: bytes.into(),
        }
    }
}

/// Transfer rate caps in bytes per second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum download rate; `None` leaves the engine default in place.
    pub download_bps: Option<u64>,
    /// Maximum upload rate; `None` leaves the engine default in place.
    pub upload_bps: Option<u64>,
}

/// Request payload for admitting a new download job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Identifier assigned by the control plane.
    pub job_id: JobId,
    /// Where the payload comes from (magnet or metainfo).
    pub source: TorrentSource,
    /// Directory the payload is written into.
    pub download_dir: PathBuf,
    /// Optional transfer rate caps.
    #[serde(default)]
    pub rate_limit: RateLimit,
}

impl StartRequest {
    /// Check the request for structural problems before it reaches the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRequest`] when the source payload is
    /// empty or the download directory is blank.
    pub fn validate(&self) -> EngineResult<()> {
        match &self.source {
            TorrentSource::Magnet { uri } if !uri.starts_with("magnet:") => {
                return Err(EngineError::InvalidRequest {
                    field: "source.uri",
                    reason: "not_a_magnet_uri",
                });
            }
            TorrentSource::Metainfo { bytes } if bytes.is_empty() => {
                return Err(EngineError::InvalidRequest {
                    field: "source.bytes",
                    reason: "empty_metainfo",
                });
            }
            TorrentSource::Magnet { .. } | TorrentSource::Metainfo { .. } => {}
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(EngineError::InvalidRequest {
                field: "download_dir",
                reason: "empty",
            });
        }
        Ok(())
    }
}

/// Lifecycle states a transfer moves through inside the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Waiting for metadata (magnet resolution).
    Metadata,
    /// Actively downloading payload data.
    Downloading,
    /// Download complete, engine would seed if permitted.
    Seeding,
    /// Transfer finished successfully.
    Done,
    /// Transfer failed.
    Error,
}

impl TransferState {
    /// Whether the state ends the transfer's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Snapshot of a transfer's progress at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    /// Completion percentage, 0 to 100. Non-decreasing for a given job.
    pub progress_pct: f64,
    /// Current download rate in bytes per second.
    pub download_speed: u64,
    /// Current upload rate in bytes per second. Effectively always zero:
    /// seeding is disabled by policy.
    pub upload_speed: u64,
    /// Connected peer count.
    pub peers: u32,
    /// Connected seed count.
    pub seeds: u32,
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes expected.
    pub bytes_total: u64,
    /// Estimated seconds until completion, when known.
    pub eta: Option<u64>,
    /// Lifecycle state the snapshot was taken in.
    pub status: TransferState,
    /// Failure description, populated only when `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self {
            progress_pct: 0.0,
            download_speed: 0,
            upload_speed: 0,
            peers: 0,
            seeds: 0,
            bytes_downloaded: 0,
            bytes_total: 0,
            eta: None,
            status: TransferState::Metadata,
            error: None,
        }
    }
}

/// Individual file described by torrent metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TorrentFileInfo {
    /// Path relative to the download directory.
    pub path: String,
    /// Size of the file in bytes.
    pub size_bytes: u64,
}

/// Torrent metadata resolved by the engine. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentMetadata {
    /// Hex-encoded info-hash.
    pub infohash: String,
    /// Display name of the torrent.
    pub name: String,
    /// Sum of all file sizes in bytes.
    pub total_size_bytes: u64,
    /// Files contained in the payload.
    pub files: Vec<TorrentFileInfo>,
    /// Tracker announce URLs.
    pub announce_list: Vec<String>,
    /// Optional free-form comment from the metainfo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Optional creation timestamp from the metainfo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Events emitted by the underlying download session before they are folded
/// into per-job progress snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The session accepted the job and the transfer machinery is live.
    Ready {
        /// Job identifier.
        job_id: JobId,
    },
    /// Torrent metadata became available.
    MetadataResolved {
        /// Job identifier.
        job_id: JobId,
        /// Resolved metadata.
        metadata: TorrentMetadata,
    },
    /// Progress metrics were updated.
    Progress {
        /// Job identifier.
        job_id: JobId,
        /// Updated progress snapshot.
        progress: TransferProgress,
    },
    /// The transfer moved to a new lifecycle state.
    StateChanged {
        /// Job identifier.
        job_id: JobId,
        /// New state.
        state: TransferState,
    },
    /// The transfer finished successfully.
    Completed {
        /// Job identifier.
        job_id: JobId,
    },
    /// The transfer failed.
    Failed {
        /// Job identifier.
        job_id: JobId,
        /// Human-readable failure description.
        message: String,
    },
}
