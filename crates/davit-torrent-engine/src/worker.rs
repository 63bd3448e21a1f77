#![allow(clippy::redundant_pub_crate)]

//! Background task that owns the session and folds its events into per-job
//! progress channels.

use std::collections::HashMap;
use std::time::Duration;

use davit_torrent_core::{
    EngineEvent, JobId, TorrentMetadata, TransferProgress, TransferState,
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::command::EngineCommand;
use crate::session::TorrentSession;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub(crate) fn spawn(mut commands: mpsc::Receiver<EngineCommand>, session: Box<dyn TorrentSession>) {
    tokio::spawn(async move {
        let mut worker = Worker::new(session);
        let mut poll = tokio::time::interval(EVENT_POLL_INTERVAL);
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => worker.handle(command).await,
                        None => break,
                    }
                }
                _ = poll.tick() => {
                    if let Err(err) = worker.pump_events().await {
                        warn!(error = %err, "session event polling failed");
                    }
                }
            }
        }
    });
}

struct Worker {
    session: Box<dyn TorrentSession>,
    jobs: HashMap<JobId, JobSlot>,
}

struct JobSlot {
    progress: mpsc::Sender<TransferProgress>,
    ready: Option<oneshot::Sender<anyhow::Result<()>>>,
    latest: TransferProgress,
    metadata: Option<TorrentMetadata>,
}

impl Worker {
    fn new(session: Box<dyn TorrentSession>) -> Self {
        Self {
            session,
            jobs: HashMap::new(),
        }
    }

    async fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Add {
                request,
                progress,
                ready,
            } => {
                let job_id = request.job_id.clone();
                match self.session.add(&request).await {
                    Ok(()) => {
                        self.jobs.insert(
                            job_id,
                            JobSlot {
                                progress,
                                ready: Some(ready),
                                latest: TransferProgress::default(),
                                metadata: None,
                            },
                        );
                    }
                    Err(err) => {
                        warn!(job_id = %job_id, error = %err, "session rejected job admission");
                        let _ = ready.send(Err(err));
                    }
                }
            }
            EngineCommand::Stop { job_id } => {
                if self.jobs.remove(&job_id).is_none() {
                    debug!(job_id = %job_id, "stop requested for unknown job");
                }
                if let Err(err) = self.session.remove(&job_id, false).await {
                    warn!(job_id = %job_id, error = %err, "session remove failed");
                }
            }
            EngineCommand::QueryProgress { job_id, respond_to } => {
                let snapshot = self.jobs.get(&job_id).map(|slot| slot.latest.clone());
                let _ = respond_to.send(snapshot);
            }
            EngineCommand::QueryMetadata { job_id, respond_to } => {
                let metadata = self
                    .jobs
                    .get(&job_id)
                    .and_then(|slot| slot.metadata.clone());
                let _ = respond_to.send(metadata);
            }
            EngineCommand::QueryFiles { job_id, respond_to } => {
                let files = self
                    .jobs
                    .get(&job_id)
                    .and_then(|slot| slot.metadata.as_ref().map(|meta| meta.files.clone()));
                let _ = respond_to.send(files);
            }
        }
    }

    async fn pump_events(&mut self) -> anyhow::Result<()> {
        let events = self.session.poll_events().await?;
        for event in events {
            self.apply_event(event);
        }
        Ok(())
    }

    fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready { job_id } => {
                if let Some(slot) = self.slot_mut(&job_id)
                    && let Some(ready) = slot.ready.take()
                {
                    let _ = ready.send(Ok(()));
                }
            }
            EngineEvent::MetadataResolved { job_id, metadata } => {
                if let Some(slot) = self.slot_mut(&job_id) {
                    slot.latest.bytes_total = metadata.total_size_bytes;
                    slot.metadata = Some(metadata);
                    if let Some(ready) = slot.ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                    push_snapshot(slot);
                }
            }
            EngineEvent::Progress { job_id, progress } => {
                if let Some(slot) = self.slot_mut(&job_id) {
                    let mut merged = progress;
                    // Progress never moves backwards within a job.
                    merged.progress_pct = merged.progress_pct.max(slot.latest.progress_pct);
                    slot.latest = merged;
                    push_snapshot(slot);
                }
            }
            EngineEvent::StateChanged { job_id, state } => {
                if let Some(slot) = self.slot_mut(&job_id) {
                    slot.latest.status = state;
                    push_snapshot(slot);
                }
            }
            EngineEvent::Completed { job_id } => {
                if let Some(slot) = self.slot_mut(&job_id) {
                    slot.latest.status = TransferState::Done;
                    slot.latest.progress_pct = 100.0;
                    slot.latest.bytes_downloaded = slot.latest.bytes_total;
                    slot.latest.download_speed = 0;
                    slot.latest.eta = Some(0);
                    push_snapshot(slot);
                }
            }
            EngineEvent::Failed { job_id, message } => {
                if let Some(slot) = self.slot_mut(&job_id) {
                    slot.latest.status = TransferState::Error;
                    slot.latest.error = Some(message);
                    push_snapshot(slot);
                }
            }
        }
    }

    fn slot_mut(&mut self, job_id: &JobId) -> Option<&mut JobSlot> {
        let slot = self.jobs.get_mut(job_id);
        if slot.is_none() {
            debug!(job_id = %job_id, "event for untracked job dropped");
        }
        slot
    }
}

fn push_snapshot(slot: &JobSlot) {
    match slot.progress.try_send(slot.latest.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            // The consumer lags behind; it will catch up from `latest` on
            // its next heartbeat.
            debug!("progress buffer full, snapshot coalesced");
        }
        Err(TrySendError::Closed(_)) => {}
    }
}
