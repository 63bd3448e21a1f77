//! Process-wide job registry.
//!
//! One entry per active job, keyed by job id. Entries live only for the
//! lifetime of the process; there is deliberately no persistence or
//! recovery story (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use davit_torrent_core::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::PipelineError;

/// Lifecycle status of a registry entry.
///
/// Transitions are monotonic: `Starting → Running → terminal`, where a
/// terminal status (`Completed`/`Failed`/`Stopped`) never reverts, and a
/// job never jumps straight from `Starting` to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, engine admission in progress.
    Starting,
    /// Engine accepted the job; progress is flowing.
    Running,
    /// Finished successfully (including fail-open scan errors).
    Completed,
    /// Finished with an engine error or an infected payload.
    Failed,
    /// Stopped on request.
    Stopped,
}

impl JobStatus {
    /// Whether the status ends the job's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// Point-in-time copy of a registry entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was registered.
    pub started_at: DateTime<Utc>,
}

struct JobEntry {
    status: JobStatus,
    started_at: DateTime<Utc>,
    // Handle of the detached pipeline task. Held so failures are in
    // principle observable; dropping it on removal detaches the task
    // without cancelling in-flight work.
    handle: Option<JoinHandle<()>>,
}

/// Shared, jobId-partitioned registry of active and finished jobs.
#[derive(Clone, Default)]
pub struct JobRegistry {
    entries: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job in `Starting`. Terminal leftovers under the same id
    /// are replaced; an active entry is a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Conflict`] when a non-terminal entry with
    /// the same id exists.
    pub async fn register(&self, job_id: &JobId) -> Result<(), PipelineError> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(job_id)
            && !existing.status.is_terminal()
        {
            return Err(PipelineError::Conflict {
                job_id: job_id.clone(),
            });
        }
        entries.insert(
            job_id.clone(),
            JobEntry {
                status: JobStatus::Starting,
                started_at: Utc::now(),
                handle: None,
            },
        );
        Ok(())
    }

    /// Store the detached pipeline task's handle next to its entry.
    pub async fn attach_handle(&self, job_id: &JobId, handle: JoinHandle<()>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(job_id) {
            entry.handle = Some(handle);
        }
    }

    /// Attempt a status transition, enforcing monotonicity. Returns whether
    /// the transition was applied.
    pub async fn advance(&self, job_id: &JobId, status: JobStatus) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(job_id) else {
            return false;
        };
        let allowed = matches!(
            (entry.status, status),
            (
                JobStatus::Starting,
                JobStatus::Running | JobStatus::Failed | JobStatus::Stopped
            ) | (
                JobStatus::Running,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
            )
        );
        if allowed {
            entry.status = status;
        }
        allowed
    }

    /// Remove an entry, returning its final snapshot. The pipeline task, if
    /// still running, is detached rather than cancelled.
    pub async fn remove(&self, job_id: &JobId) -> Option<JobSnapshot> {
        let mut entries = self.entries.write().await;
        entries.remove(job_id).map(|entry| JobSnapshot {
            status: entry.status,
            started_at: entry.started_at,
        })
    }

    /// Whether the entry's detached pipeline task has finished. `None` when
    /// the job is unknown or no task was ever attached.
    pub async fn task_finished(&self, job_id: &JobId) -> Option<bool> {
        let entries = self.entries.read().await;
        entries
            .get(job_id)
            .and_then(|entry| entry.handle.as_ref().map(JoinHandle::is_finished))
    }

    /// Copy out one entry's state.
    pub async fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        let entries = self.entries.read().await;
        entries.get(job_id).map(|entry| JobSnapshot {
            status: entry.status,
            started_at: entry.started_at,
        })
    }

    /// Number of jobs that have not reached a terminal status.
    pub async fn active_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| !entry.status.is_terminal())
            .count()
    }
}
