//! Engine-agnostic download interfaces and domain DTOs.
//!
//! This crate defines the capability seam between the job pipeline and
//! whatever torrent implementation backs it: the [`DownloadEngine`] trait,
//! the progress/metadata DTOs exchanged across it, and the pull-side
//! [`ProgressStream`] that bridges the engine's push-style events into a
//! consumable async sequence.

pub mod error;
pub mod model;
pub mod service;

pub use error::{EngineError, EngineResult};
pub use model::{
    EngineEvent, InvalidJobId, JobId, RateLimit, StartRequest, TorrentFileInfo, TorrentMetadata,
    TorrentSource, TransferProgress, TransferState,
};
pub use service::{DownloadEngine, PROGRESS_HEARTBEAT, ProgressStream};
