//! Engine trait implemented by download adapters, plus the pull-side
//! progress sequence consumed by the job pipeline.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::model::{
    JobId, StartRequest, TorrentFileInfo, TorrentMetadata, TransferProgress,
};

/// Interval after which the progress sequence re-yields the latest snapshot
/// when no fresh event has arrived, so consumers observe liveness even at
/// zero transfer rate.
pub const PROGRESS_HEARTBEAT: Duration = Duration::from_secs(10);

/// Primary engine trait implemented by download adapters.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Admit a new job and return its progress sequence.
    ///
    /// Resolves as soon as the engine acknowledges the job or metadata
    /// arrives, whichever happens first; the full download is consumed
    /// through the returned [`ProgressStream`].
    async fn start(&self, request: StartRequest) -> anyhow::Result<ProgressStream>;

    /// Stop a job and destroy its underlying transfer.
    async fn stop(&self, job_id: &JobId) -> anyhow::Result<()>;

    /// Retrieve the latest progress snapshot for a job, if tracked.
    async fn progress(&self, job_id: &JobId) -> anyhow::Result<Option<TransferProgress>>;

    /// Retrieve resolved metadata for a job, if available yet.
    async fn metadata(&self, job_id: &JobId) -> anyhow::Result<Option<TorrentMetadata>>;

    /// Retrieve the file listing for a job, if metadata has resolved.
    async fn files(&self, job_id: &JobId) -> anyhow::Result<Option<Vec<TorrentFileInfo>>>;
}

/// Pull-side view of a job's progress events.
///
/// The engine worker pushes snapshots into a bounded channel; `next` awaits
/// the channel with a heartbeat timeout and re-yields the latest snapshot
/// when the engine has been silent for a full interval.
///
/// Terminal snapshots (`Done`/`Error` status) are yielded as ordinary items;
/// the sequence does not end on them. Consumers are expected to inspect the
/// status and stop iterating once it is terminal.
pub struct ProgressStream {
    receiver: mpsc::Receiver<TransferProgress>,
    latest: TransferProgress,
    heartbeat: Duration,
}

impl ProgressStream {
    /// Wrap a receiver with the default heartbeat interval.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<TransferProgress>) -> Self {
        Self::with_heartbeat(receiver, PROGRESS_HEARTBEAT)
    }

    /// Wrap a receiver with a custom heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(receiver: mpsc::Receiver<TransferProgress>, heartbeat: Duration) -> Self {
        Self {
            receiver,
            latest: TransferProgress::default(),
            heartbeat,
        }
    }

    /// Receive the next snapshot.
    ///
    /// Returns `None` only when the engine has dropped the job (for example
    /// after a stop request); a quiet engine produces heartbeat repeats of
    /// the latest snapshot instead.
    pub async fn next(&mut self) -> Option<TransferProgress> {
        match timeout(self.heartbeat, self.receiver.recv()).await {
            Ok(Some(progress)) => {
                self.latest = progress.clone();
                Some(progress)
            }
            Ok(None) => None,
            Err(_) => Some(self.latest.clone()),
        }
    }

    /// The most recent snapshot observed by this stream.
    #[must_use]
    pub fn latest(&self) -> &TransferProgress {
        &self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransferState;

    fn snapshot(pct: f64, status: TransferState) -> TransferProgress {
        TransferProgress {
            progress_pct: pct,
            status,
            ..TransferProgress::default()
        }
    }

    #[tokio::test]
    async fn stream_yields_pushed_snapshots_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = ProgressStream::new(rx);

        tx.send(snapshot(10.0, TransferState::Downloading))
            .await
            .expect("send");
        tx.send(snapshot(55.0, TransferState::Downloading))
            .await
            .expect("send");

        let first = stream.next().await.expect("first item");
        let second = stream.next().await.expect("second item");
        assert_eq!(first.progress_pct, 10.0);
        assert_eq!(second.progress_pct, 55.0);
        assert_eq!(stream.latest().progress_pct, 55.0);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_engine_produces_heartbeat_repeats() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = ProgressStream::new(rx);

        tx.send(snapshot(30.0, TransferState::Downloading))
            .await
            .expect("send");
        let live = stream.next().await.expect("live item");
        assert_eq!(live.progress_pct, 30.0);

        // No further events: the next call must still resolve, repeating the
        // latest snapshot after the heartbeat interval elapses.
        let heartbeat = stream.next().await.expect("heartbeat item");
        assert_eq!(heartbeat.progress_pct, 30.0);
        assert_eq!(heartbeat.status, TransferState::Downloading);

        // The sender is still alive, so the stream has not terminated.
        let again = stream.next().await.expect("second heartbeat");
        assert_eq!(again.progress_pct, 30.0);
        drop(tx);
    }

    #[tokio::test]
    async fn dropped_job_ends_the_stream() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = ProgressStream::new(rx);

        tx.send(snapshot(100.0, TransferState::Done))
            .await
            .expect("send");
        drop(tx);

        let terminal = stream.next().await.expect("terminal item");
        assert_eq!(terminal.status, TransferState::Done);
        assert!(stream.next().await.is_none(), "closed channel ends stream");
    }
}
