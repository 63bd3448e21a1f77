//! Orchestrator that drives one job from admission to its terminal
//! callback.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use davit_callback::{CallbackClient, CallbackEvent, DeliveryTransport, ScanOutcome, ScanReport};
use davit_scan::{ScanResult, ScanStatus, Scanner};
use davit_torrent_core::{
    DownloadEngine, JobId, RateLimit, StartRequest, TorrentSource, TransferProgress, TransferState,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::files::collect_files;
use crate::registry::{JobRegistry, JobStatus};

/// Inputs required to launch one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Identifier assigned by the control plane.
    pub job_id: JobId,
    /// Magnet or metainfo source.
    pub source: TorrentSource,
    /// Directory the payload is written into.
    pub download_dir: PathBuf,
    /// Control-plane endpoint callbacks are posted to.
    pub callback_url: String,
    /// Shared secret signing the callbacks.
    pub callback_secret: String,
    /// Opaque identifier threading the job's callbacks together.
    pub correlation_id: String,
}

/// Registry status combined with the engine's latest progress snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    /// Registry lifecycle status.
    pub status: JobStatus,
    /// When the job was registered.
    pub started_at: DateTime<Utc>,
    /// Latest progress, when the engine still tracks the job.
    pub progress: Option<TransferProgress>,
}

enum StreamOutcome {
    Done,
    Failed(String),
    Vanished,
}

/// Composes engine, callbacks, scanner, and registry into the per-job
/// pipeline.
pub struct JobPipeline {
    engine: Arc<dyn DownloadEngine>,
    scanner: Arc<dyn Scanner>,
    transport: Arc<dyn DeliveryTransport>,
    registry: JobRegistry,
    worker_id: String,
}

impl JobPipeline {
    /// Wire up a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        engine: Arc<dyn DownloadEngine>,
        scanner: Arc<dyn Scanner>,
        transport: Arc<dyn DeliveryTransport>,
        registry: JobRegistry,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            scanner,
            transport,
            registry,
            worker_id: worker_id.into(),
        }
    }

    /// Register a job and detach its pipeline task.
    ///
    /// Returns as soon as the job is registered; everything after that is
    /// observable only through callbacks, the registry, and the stored join
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Conflict`] when the job id is already
    /// active.
    pub async fn launch(self: &Arc<Self>, request: JobRequest) -> Result<(), PipelineError> {
        self.registry.register(&request.job_id).await?;
        let pipeline = Arc::clone(self);
        let job_id = request.job_id.clone();
        let handle = tokio::spawn(async move {
            pipeline.run(request).await;
        });
        self.registry.attach_handle(&job_id, handle).await;
        Ok(())
    }

    /// Stop a job: mark it stopped, destroy the engine transfer, drop the
    /// registry entry. Idempotent for unknown jobs. An in-flight callback
    /// retry loop is allowed to finish on its own.
    pub async fn stop(&self, job_id: &JobId) {
        self.registry.advance(job_id, JobStatus::Stopped).await;
        if let Err(err) = self.engine.stop(job_id).await {
            warn!(job_id = %job_id, error = %err, "engine stop failed");
        }
        self.registry.remove(job_id).await;
        info!(job_id = %job_id, "job stopped");
    }

    /// Registry status plus the engine's progress snapshot for one job.
    pub async fn status(&self, job_id: &JobId) -> Option<JobStatusView> {
        let snapshot = self.registry.snapshot(job_id).await?;
        let progress = self.engine.progress(job_id).await.ok().flatten();
        Some(JobStatusView {
            status: snapshot.status,
            started_at: snapshot.started_at,
            progress,
        })
    }

    /// Number of jobs that have not reached a terminal status.
    pub async fn active_jobs(&self) -> usize {
        self.registry.active_count().await
    }

    /// Identifier this agent stamps into callback payloads.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn run(&self, request: JobRequest) {
        let callbacks = CallbackClient::new(
            Arc::clone(&self.transport),
            request.callback_url.clone(),
            request.callback_secret.clone(),
            request.correlation_id.clone(),
        );
        let job_id = request.job_id.clone();
        info!(
            job_id = %job_id,
            correlation_id = %request.correlation_id,
            "job pipeline starting"
        );

        if let Err(err) = fs::create_dir_all(&request.download_dir) {
            self.fail(
                &callbacks,
                &job_id,
                format!("failed to create download dir: {err}"),
                None,
            )
            .await;
            return;
        }

        let start = StartRequest {
            job_id: job_id.clone(),
            source: request.source.clone(),
            download_dir: request.download_dir.clone(),
            rate_limit: RateLimit::default(),
        };
        let mut stream = match self.engine.start(start).await {
            Ok(stream) => stream,
            Err(err) => {
                self.fail(&callbacks, &job_id, err.to_string(), None).await;
                return;
            }
        };
        self.registry.advance(&job_id, JobStatus::Running).await;

        let mut sequence = 0u64;
        let outcome = loop {
            match stream.next().await {
                Some(progress) if progress.status == TransferState::Done => {
                    break StreamOutcome::Done;
                }
                Some(progress) if progress.status == TransferState::Error => {
                    break StreamOutcome::Failed(
                        progress
                            .error
                            .unwrap_or_else(|| "engine reported an error".to_string()),
                    );
                }
                Some(progress) => {
                    sequence += 1;
                    callbacks
                        .send(&CallbackEvent::progress(
                            &job_id,
                            &self.worker_id,
                            sequence,
                            progress,
                        ))
                        .await;
                }
                None => break StreamOutcome::Vanished,
            }
        };

        match outcome {
            StreamOutcome::Done => {
                self.finalize(&callbacks, &job_id, &request.download_dir)
                    .await;
            }
            StreamOutcome::Failed(message) => {
                self.fail(&callbacks, &job_id, message, None).await;
            }
            StreamOutcome::Vanished => match self.registry.snapshot(&job_id).await {
                Some(snapshot) if snapshot.status == JobStatus::Stopped => {
                    info!(job_id = %job_id, "job stopped, pipeline exiting");
                }
                None => {
                    info!(job_id = %job_id, "job removed, pipeline exiting");
                }
                Some(_) => {
                    self.fail(
                        &callbacks,
                        &job_id,
                        "engine dropped the job unexpectedly",
                        None,
                    )
                    .await;
                }
            },
        }
    }

    async fn finalize(&self, callbacks: &CallbackClient, job_id: &JobId, download_dir: &Path) {
        let files = collect_files(download_dir);
        callbacks
            .send(&CallbackEvent::scan_started(job_id, &self.worker_id))
            .await;

        let scan = self.scanner.scan(download_dir).await;
        let report = scan_report(&scan);

        if scan.status == ScanStatus::Infected {
            warn!(
                job_id = %job_id,
                detail = ?scan.detail,
                "infected payload, deleting download directory"
            );
            if let Err(err) = fs::remove_dir_all(download_dir) {
                warn!(job_id = %job_id, error = %err, "failed to delete infected payload");
            }
            self.fail(
                callbacks,
                job_id,
                "malware detected in downloaded payload",
                Some(report),
            )
            .await;
            return;
        }

        if scan.status == ScanStatus::Error {
            // Fail-open: the scan gate reports its own failure as metadata
            // and the job still completes.
            warn!(
                job_id = %job_id,
                detail = ?scan.detail,
                "scan failed, completing fail-open"
            );
        }

        callbacks
            .send(&CallbackEvent::completed(
                job_id,
                &self.worker_id,
                files,
                Some(report),
            ))
            .await;
        self.registry.advance(job_id, JobStatus::Completed).await;
        info!(job_id = %job_id, "job completed");
    }

    async fn fail(
        &self,
        callbacks: &CallbackClient,
        job_id: &JobId,
        message: impl Into<String>,
        scan: Option<ScanReport>,
    ) {
        let message = message.into();
        error!(job_id = %job_id, error = %message, "job failed");
        callbacks
            .send(&CallbackEvent::failed(
                job_id,
                &self.worker_id,
                message,
                scan,
            ))
            .await;
        self.registry.advance(job_id, JobStatus::Failed).await;
    }
}

fn scan_report(scan: &ScanResult) -> ScanReport {
    ScanReport {
        scan_status: match scan.status {
            ScanStatus::Clean => ScanOutcome::Clean,
            ScanStatus::Infected => ScanOutcome::Infected,
            ScanStatus::Error => ScanOutcome::Error,
        },
        scan_detail: scan.detail.clone(),
        scan_duration_ms: scan.duration_ms,
        files_scanned: scan.files_scanned,
        infected_count: scan.infected_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use davit_torrent_engine::{SessionEngine, SimSession};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport double that records every delivered body as JSON.
    #[derive(Default)]
    struct MemoryTransport {
        deliveries: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl DeliveryTransport for MemoryTransport {
        async fn deliver(
            &self,
            _url: &str,
            _headers: &[(&'static str, String)],
            body: &str,
        ) -> anyhow::Result<u16> {
            let value: serde_json::Value = serde_json::from_str(body)?;
            self.deliveries.lock().expect("lock").push(value);
            Ok(200)
        }
    }

    struct StubScanner {
        result: ScanResult,
    }

    #[async_trait]
    impl Scanner for StubScanner {
        async fn scan(&self, _dir: &Path) -> ScanResult {
            self.result.clone()
        }
    }

    fn magnet_request(job: &str, download_dir: PathBuf) -> JobRequest {
        JobRequest {
            job_id: JobId::parse(job).expect("id"),
            source: TorrentSource::magnet("magnet:?xt=urn:btih:feedface&dn=episode"),
            download_dir,
            callback_url: "http://control-plane.invalid/callback".to_string(),
            callback_secret: "secret".to_string(),
            correlation_id: "corr-1".to_string(),
        }
    }

    fn build_pipeline(
        scan: ScanResult,
    ) -> (Arc<JobPipeline>, Arc<MemoryTransport>, JobRegistry) {
        let engine = Arc::new(SessionEngine::with_session(Box::new(SimSession::default())));
        let transport = Arc::new(MemoryTransport::default());
        let registry = JobRegistry::new();
        let pipeline = Arc::new(JobPipeline::new(
            engine,
            Arc::new(StubScanner { result: scan }),
            transport.clone(),
            registry.clone(),
            "worker-1",
        ));
        (pipeline, transport, registry)
    }

    async fn wait_for_terminal(registry: &JobRegistry, job_id: &JobId) -> JobStatus {
        for _ in 0..100 {
            if let Some(snapshot) = registry.snapshot(job_id).await
                && snapshot.status.is_terminal()
            {
                return snapshot.status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job never reached a terminal status");
    }

    #[tokio::test]
    async fn clean_job_emits_progress_then_exactly_one_completion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let download_dir = dir.path().join("job-clean");
        let (pipeline, transport, registry) = build_pipeline(ScanResult::clean(1, 12));
        let request = magnet_request("job-clean", download_dir.clone());
        let job_id = request.job_id.clone();

        pipeline.launch(request).await.expect("launch");
        let status = wait_for_terminal(&registry, &job_id).await;
        assert_eq!(status, JobStatus::Completed);

        let deliveries = transport.deliveries.lock().expect("lock");
        let kinds: Vec<String> = deliveries
            .iter()
            .map(|value| value["eventType"].as_str().expect("eventType").to_string())
            .collect();

        let progress_ticks = kinds.iter().filter(|kind| *kind == "progress_update").count();
        assert!(progress_ticks >= 2, "expected >=2 progress ticks, got {kinds:?}");
        assert_eq!(
            kinds.iter().filter(|kind| *kind == "job_completed").count(),
            1,
            "exactly one completion"
        );
        assert_eq!(kinds.last().map(String::as_str), Some("job_completed"));
        assert!(kinds.contains(&"scan_started".to_string()));

        // The completion's file list matches what is on disk.
        let completed = deliveries
            .iter()
            .find(|value| value["eventType"] == "job_completed")
            .expect("completion event");
        let disk_files = collect_files(&download_dir);
        assert_eq!(
            completed["files"].as_array().expect("files").len(),
            disk_files.len()
        );
        assert_eq!(completed["scanStatus"], "clean");
        assert_eq!(completed["workerId"], "worker-1");

        // Idempotency keys are unique, progress sequence strictly grows.
        let keys: HashSet<&str> = deliveries
            .iter()
            .map(|value| value["idempotencyKey"].as_str().expect("key"))
            .collect();
        assert_eq!(keys.len(), deliveries.len());

        let mut last_pct = 0.0_f64;
        for value in deliveries.iter().filter(|v| v["eventType"] == "progress_update") {
            let pct = value["progress"]["progressPct"].as_f64().expect("pct");
            assert!(pct >= last_pct, "progress went backwards");
            last_pct = pct;
        }
        drop(deliveries);

        // The detached task's handle is stored with the entry; it settles
        // shortly after the terminal callback.
        for _ in 0..100 {
            if registry.task_finished(&job_id).await == Some(true) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.task_finished(&job_id).await, Some(true));
    }

    #[tokio::test]
    async fn infected_job_deletes_payload_and_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let download_dir = dir.path().join("job-infected");
        let (pipeline, transport, registry) = build_pipeline(ScanResult::infected(
            Some("payload.bin: Eicar-Test-Signature FOUND".to_string()),
            1,
            1,
            34,
        ));
        let request = magnet_request("job-infected", download_dir.clone());
        let job_id = request.job_id.clone();

        pipeline.launch(request).await.expect("launch");
        let status = wait_for_terminal(&registry, &job_id).await;
        assert_eq!(status, JobStatus::Failed);
        assert!(!download_dir.exists(), "infected payload must be deleted");

        let deliveries = transport.deliveries.lock().expect("lock");
        let failed: Vec<_> = deliveries
            .iter()
            .filter(|value| value["eventType"] == "job_failed")
            .collect();
        assert_eq!(failed.len(), 1, "exactly one failure callback");
        assert_eq!(failed[0]["scanStatus"], "infected");
        assert!(
            failed[0]["scanDetail"]
                .as_str()
                .is_some_and(|detail| detail.contains("Eicar")),
        );
        assert!(
            !deliveries
                .iter()
                .any(|value| value["eventType"] == "job_completed"),
            "infected jobs never complete"
        );
    }

    #[tokio::test]
    async fn scan_error_is_fail_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let download_dir = dir.path().join("job-failopen");
        let (pipeline, transport, registry) =
            build_pipeline(ScanResult::error("scanner binary not found", 2));
        let request = magnet_request("job-failopen", download_dir.clone());
        let job_id = request.job_id.clone();

        pipeline.launch(request).await.expect("launch");
        let status = wait_for_terminal(&registry, &job_id).await;
        assert_eq!(status, JobStatus::Completed, "scan errors do not block delivery");
        assert!(download_dir.exists(), "payload kept on fail-open");

        let deliveries = transport.deliveries.lock().expect("lock");
        let completed = deliveries
            .iter()
            .find(|value| value["eventType"] == "job_completed")
            .expect("completion event");
        assert_eq!(completed["scanStatus"], "error");
    }

    #[tokio::test]
    async fn duplicate_launch_is_a_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (pipeline, _transport, _registry) = build_pipeline(ScanResult::clean(0, 1));
        let request = magnet_request("job-dup", dir.path().join("job-dup"));

        pipeline.launch(request.clone()).await.expect("first launch");
        assert!(matches!(
            pipeline.launch(request).await,
            Err(PipelineError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent_for_unknown_jobs() {
        let (pipeline, _transport, registry) = build_pipeline(ScanResult::clean(0, 1));
        let unknown = JobId::parse("never-started").expect("id");

        pipeline.stop(&unknown).await;
        assert!(registry.snapshot(&unknown).await.is_none());
    }

    #[tokio::test]
    async fn stop_removes_the_registry_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (pipeline, _transport, registry) = build_pipeline(ScanResult::clean(0, 1));
        let request = magnet_request("job-stopme", dir.path().join("job-stopme"));
        let job_id = request.job_id.clone();

        pipeline.launch(request).await.expect("launch");
        pipeline.stop(&job_id).await;
        assert!(registry.snapshot(&job_id).await.is_none());
    }
}
