#![allow(clippy::redundant_pub_crate)]

//! Command definitions exchanged between the adapter and its worker task.

use davit_torrent_core::{
    JobId, StartRequest, TorrentFileInfo, TorrentMetadata, TransferProgress,
};
use tokio::sync::{mpsc, oneshot};

/// Commands accepted by the engine worker.
pub(crate) enum EngineCommand {
    /// Admit a job into the session and begin pumping its progress.
    Add {
        /// Validated admission request.
        request: Box<StartRequest>,
        /// Per-job channel the worker pushes progress snapshots into.
        progress: mpsc::Sender<TransferProgress>,
        /// Resolved once the session acknowledges the job or metadata
        /// arrives, whichever happens first.
        ready: oneshot::Sender<anyhow::Result<()>>,
    },
    /// Stop a job and destroy its underlying transfer.
    Stop {
        /// Job identifier.
        job_id: JobId,
    },
    /// Fetch the latest progress snapshot for a job.
    QueryProgress {
        /// Job identifier.
        job_id: JobId,
        /// Channel used to return the snapshot.
        respond_to: oneshot::Sender<Option<TransferProgress>>,
    },
    /// Fetch resolved metadata for a job.
    QueryMetadata {
        /// Job identifier.
        job_id: JobId,
        /// Channel used to return the metadata.
        respond_to: oneshot::Sender<Option<TorrentMetadata>>,
    },
    /// Fetch the file listing for a job.
    QueryFiles {
        /// Job identifier.
        job_id: JobId,
        /// Channel used to return the file listing.
        respond_to: oneshot::Sender<Option<Vec<TorrentFileInfo>>>,
    },
}
