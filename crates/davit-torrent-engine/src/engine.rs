//! Adapter that exposes the worker-driven session as a
//! [`DownloadEngine`].

use std::time::Duration;

use async_trait::async_trait;
use davit_torrent_core::{
    DownloadEngine, EngineError, JobId, ProgressStream, StartRequest, TorrentFileInfo,
    TorrentMetadata, TransferProgress,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::warn;

use crate::command::EngineCommand;
use crate::session::TorrentSession;
use crate::worker;

const COMMAND_BUFFER: usize = 64;
const PROGRESS_BUFFER: usize = 32;
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload cap applied to every admitted job, in bytes per second.
///
/// Seeding is disabled as a matter of policy: outbound transfer is capped to
/// a token rate regardless of what the caller requests.
pub const UPLOAD_CAP_BPS: u64 = 1;

/// Download engine backed by a [`TorrentSession`] driven on a background
/// worker task.
#[derive(Clone)]
pub struct SessionEngine {
    commands: mpsc::Sender<EngineCommand>,
}

impl SessionEngine {
    /// Construct an engine around an injected session.
    #[must_use]
    pub fn with_session(session: Box<dyn TorrentSession>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        worker::spawn(receiver, session);
        Self { commands }
    }

    async fn send_command(
        &self,
        command: EngineCommand,
        operation: &'static str,
    ) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::WorkerUnavailable { operation })
    }
}

#[async_trait]
impl DownloadEngine for SessionEngine {
    async fn start(&self, mut request: StartRequest) -> anyhow::Result<ProgressStream> {
        request.validate()?;
        request.rate_limit.upload_bps = Some(UPLOAD_CAP_BPS);

        let job_id = request.job_id.clone();
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();
        self.send_command(
            EngineCommand::Add {
                request: Box::new(request),
                progress: progress_tx,
                ready: ready_tx,
            },
            "start",
        )
        .await?;

        match timeout(READY_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => return Err(err),
            Ok(Err(_)) => {
                return Err(EngineError::WorkerUnavailable { operation: "start" }.into());
            }
            Err(_) => {
                // Safety valve: a hung session must never block admission
                // indefinitely. The caller proceeds on the progress stream.
                warn!(job_id = %job_id, "engine readiness timed out, continuing");
            }
        }
        Ok(ProgressStream::new(progress_rx))
    }

    async fn stop(&self, job_id: &JobId) -> anyhow::Result<()> {
        self.send_command(
            EngineCommand::Stop {
                job_id: job_id.clone(),
            },
            "stop",
        )
        .await?;
        Ok(())
    }

    async fn progress(&self, job_id: &JobId) -> anyhow::Result<Option<TransferProgress>> {
        let (respond_to, receiver) = oneshot::channel();
        self.send_command(
            EngineCommand::QueryProgress {
                job_id: job_id.clone(),
                respond_to,
            },
            "progress",
        )
        .await?;
        Ok(receiver
            .await
            .map_err(|_| EngineError::WorkerUnavailable {
                operation: "progress",
            })?)
    }

    async fn metadata(&self, job_id: &JobId) -> anyhow::Result<Option<TorrentMetadata>> {
        let (respond_to, receiver) = oneshot::channel();
        self.send_command(
            EngineCommand::QueryMetadata {
                job_id: job_id.clone(),
                respond_to,
            },
            "metadata",
        )
        .await?;
        Ok(receiver
            .await
            .map_err(|_| EngineError::WorkerUnavailable {
                operation: "metadata",
            })?)
    }

    async fn files(&self, job_id: &JobId) -> anyhow::Result<Option<Vec<TorrentFileInfo>>> {
        let (respond_to, receiver) = oneshot::channel();
        self.send_command(
            EngineCommand::QueryFiles {
                job_id: job_id.clone(),
                respond_to,
            },
            "files",
        )
        .await?;
        Ok(receiver
            .await
            .map_err(|_| EngineError::WorkerUnavailable { operation: "files" })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SimSession;
    use davit_torrent_core::{RateLimit, TorrentSource, TransferState};
    use std::sync::{Arc, Mutex};

    fn magnet_request(job: &str, dir: &std::path::Path) -> StartRequest {
        StartRequest {
            job_id: JobId::parse(job).expect("id"),
            source: TorrentSource::magnet("magnet:?xt=urn:btih:feedfacefeedface&dn=sample"),
            download_dir: dir.to_path_buf(),
            rate_limit: RateLimit {
                download_bps: Some(4_000_000),
                upload_bps: Some(750_000),
            },
        }
    }

    /// Session double that records admissions and stays silent forever.
    struct RecordingSession {
        seen: Arc<Mutex<Vec<StartRequest>>>,
    }

    #[async_trait]
    impl TorrentSession for RecordingSession {
        async fn add(&mut self, request: &StartRequest) -> anyhow::Result<()> {
            self.seen.lock().expect("lock").push(request.clone());
            Ok(())
        }

        async fn remove(&mut self, _job_id: &JobId, _delete_data: bool) -> anyhow::Result<()> {
            Ok(())
        }

        async fn poll_events(&mut self) -> anyhow::Result<Vec<davit_torrent_core::EngineEvent>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn sim_job_runs_to_completion_with_monotonic_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SessionEngine::with_session(Box::new(SimSession::default()));
        let request = magnet_request("job-e2e", dir.path());
        let job_id = request.job_id.clone();

        let mut stream = engine.start(request).await.expect("start");
        let mut last_pct = 0.0_f64;
        let mut ticks = 0usize;
        loop {
            let progress = stream.next().await.expect("stream item");
            assert!(
                progress.progress_pct >= last_pct,
                "progress went backwards: {} -> {}",
                last_pct,
                progress.progress_pct
            );
            last_pct = progress.progress_pct;
            ticks += 1;
            assert!(ticks < 32, "terminal state never reached");
            if progress.status.is_terminal() {
                assert_eq!(progress.status, TransferState::Done);
                assert_eq!(progress.progress_pct, 100.0);
                break;
            }
        }

        let metadata = engine.metadata(&job_id).await.expect("metadata query");
        assert_eq!(metadata.expect("metadata").name, "sample");
        let files = engine.files(&job_id).await.expect("files query");
        assert_eq!(files.expect("files").len(), 1);
    }

    #[tokio::test]
    async fn upload_cap_overrides_caller_limits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = SessionEngine::with_session(Box::new(RecordingSession { seen: seen.clone() }));
        let dir = tempfile::tempdir().expect("tempdir");

        // The recording session never signals readiness; use the paused
        // clock so the 30s safety valve fires instantly.
        let request = magnet_request("job-cap", dir.path());
        tokio::time::pause();
        engine.start(request).await.expect("start resolves");

        let recorded = seen.lock().expect("lock");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].rate_limit.upload_bps, Some(UPLOAD_CAP_BPS));
        assert_eq!(recorded[0].rate_limit.download_bps, Some(4_000_000));
    }

    #[tokio::test]
    async fn stop_forgets_the_job_and_ends_the_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SessionEngine::with_session(Box::new(SimSession::default()));
        let request = magnet_request("job-stop", dir.path());
        let job_id = request.job_id.clone();

        let mut stream = engine.start(request).await.expect("start");
        engine.stop(&job_id).await.expect("stop");

        // Buffered items may still drain; the stream must close afterwards.
        let mut remaining = 0usize;
        while stream.next().await.is_some() {
            remaining += 1;
            assert!(remaining < 16, "stream never closed after stop");
        }

        let progress = engine.progress(&job_id).await.expect("progress query");
        assert!(progress.is_none(), "stopped job still tracked");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_admission() {
        let engine = SessionEngine::with_session(Box::new(SimSession::default()));
        let request = StartRequest {
            job_id: JobId::parse("job-bad").expect("id"),
            source: TorrentSource::magnet("http://not-magnet"),
            download_dir: "/tmp/davit-bad".into(),
            rate_limit: RateLimit::default(),
        };
        assert!(engine.start(request).await.is_err());
    }
}
