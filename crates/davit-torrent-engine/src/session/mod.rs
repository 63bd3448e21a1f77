//! Boundary trait between the engine worker and the external download
//! library.
//!
//! The library's own network protocol is out of scope here; adapters only
//! need to admit and remove transfers and surface lifecycle events through
//! [`TorrentSession::poll_events`]. [`SimSession`] is the in-tree
//! implementation used by tests and by builds without a native library
//! binding.

use anyhow::Result;
use async_trait::async_trait;
use davit_torrent_core::{EngineEvent, JobId, StartRequest};

mod sim;

pub use sim::SimSession;

/// Interface contract the external download library must satisfy.
#[async_trait]
pub trait TorrentSession: Send {
    /// Admit a transfer. Rate caps from the request are applied on
    /// admission; readiness and metadata are reported asynchronously via
    /// [`TorrentSession::poll_events`].
    async fn add(&mut self, request: &StartRequest) -> Result<()>;

    /// Remove a transfer, optionally deleting its on-disk data. Removing an
    /// unknown job is a no-op.
    async fn remove(&mut self, job_id: &JobId, delete_data: bool) -> Result<()>;

    /// Drain pending lifecycle events.
    async fn poll_events(&mut self) -> Result<Vec<EngineEvent>>;
}

/// Construct the default session implementation.
///
/// # Errors
///
/// Returns an error if the session cannot be initialised.
pub fn create_session() -> Result<Box<dyn TorrentSession>> {
    Ok(Box::new(SimSession::default()))
}
