use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use davit_torrent_core::{
    EngineEvent, JobId, StartRequest, TorrentFileInfo, TorrentMetadata, TorrentSource,
    TransferProgress, TransferState,
};

use super::TorrentSession;

const SIM_PAYLOAD: &[u8] = b"davit simulated payload\n";
const FALLBACK_INFOHASH: &str = "0000000000000000000000000000000000000000";

/// Deterministic in-process session used by tests and by builds without a
/// native download library binding.
///
/// Each admitted job writes a single payload file into its download
/// directory and then replays a fixed event script across successive
/// [`TorrentSession::poll_events`] calls: ready/metadata, halfway progress,
/// completion.
#[derive(Default)]
pub struct SimSession {
    jobs: HashMap<JobId, SimJob>,
}

struct SimJob {
    download_dir: PathBuf,
    batches: VecDeque<Vec<EngineEvent>>,
}

#[async_trait]
impl TorrentSession for SimSession {
    async fn add(&mut self, request: &StartRequest) -> Result<()> {
        let job_id = request.job_id.clone();
        let name = display_name(request);
        let file_name = format!("{name}.bin");

        fs::create_dir_all(&request.download_dir).with_context(|| {
            format!(
                "failed to create download dir {}",
                request.download_dir.display()
            )
        })?;
        fs::write(request.download_dir.join(&file_name), SIM_PAYLOAD)
            .with_context(|| format!("failed to write simulated payload for job {job_id}"))?;

        let total = SIM_PAYLOAD.len() as u64;
        let metadata = TorrentMetadata {
            infohash: infohash(request),
            name: name.clone(),
            total_size_bytes: total,
            files: vec![TorrentFileInfo {
                path: file_name,
                size_bytes: total,
            }],
            announce_list: vec!["udp://tracker.invalid:6969/announce".to_string()],
            comment: None,
            created_at: None,
        };

        let halfway = TransferProgress {
            progress_pct: 50.0,
            download_speed: 1_250_000,
            upload_speed: 0,
            peers: 4,
            seeds: 2,
            bytes_downloaded: total / 2,
            bytes_total: total,
            eta: Some(4),
            status: TransferState::Downloading,
            error: None,
        };
        let complete = TransferProgress {
            progress_pct: 100.0,
            download_speed: 0,
            bytes_downloaded: total,
            eta: Some(0),
            ..halfway.clone()
        };

        let batches = VecDeque::from([
            vec![
                EngineEvent::Ready {
                    job_id: job_id.clone(),
                },
                EngineEvent::MetadataResolved {
                    job_id: job_id.clone(),
                    metadata,
                },
            ],
            vec![
                EngineEvent::StateChanged {
                    job_id: job_id.clone(),
                    state: TransferState::Downloading,
                },
                EngineEvent::Progress {
                    job_id: job_id.clone(),
                    progress: halfway,
                },
            ],
            vec![
                EngineEvent::Progress {
                    job_id: job_id.clone(),
                    progress: complete,
                },
                EngineEvent::Completed {
                    job_id: job_id.clone(),
                },
            ],
        ]);

        self.jobs.insert(
            job_id,
            SimJob {
                download_dir: request.download_dir.clone(),
                batches,
            },
        );
        Ok(())
    }

    async fn remove(&mut self, job_id: &JobId, delete_data: bool) -> Result<()> {
        if let Some(job) = self.jobs.remove(job_id)
            && delete_data
        {
            let _ = fs::remove_dir_all(&job.download_dir);
        }
        Ok(())
    }

    async fn poll_events(&mut self) -> Result<Vec<EngineEvent>> {
        let mut events = Vec::new();
        for job in self.jobs.values_mut() {
            if let Some(batch) = job.batches.pop_front() {
                events.extend(batch);
            }
        }
        Ok(events)
    }
}

fn display_name(request: &StartRequest) -> String {
    let raw = match &request.source {
        TorrentSource::Magnet { uri } => {
            magnet_param(uri, "dn").unwrap_or_else(|| request.job_id.as_str().to_string())
        }
        TorrentSource::Metainfo { .. } => request.job_id.as_str().to_string(),
    };
    raw.replace(['/', '\\'], "_")
}

fn infohash(request: &StartRequest) -> String {
    if let TorrentSource::Magnet { uri } = &request.source
        && let Some(xt) = magnet_param(uri, "xt")
        && let Some(hash) = xt.strip_prefix("urn:btih:")
    {
        return hash.to_ascii_lowercase();
    }
    FALLBACK_INFOHASH.to_string()
}

fn magnet_param(uri: &str, key: &str) -> Option<String> {
    let query = uri.split_once('?').map_or(uri, |(_, query)| query);
    for pair in query.split('&') {
        if let Some((name, value)) = pair.split_once('=')
            && name == key
            && !value.is_empty()
        {
            return Some(value.replace('+', " "));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use davit_torrent_core::RateLimit;

    fn request(dir: &std::path::Path) -> StartRequest {
        StartRequest {
            job_id: JobId::parse("sim-1").expect("id"),
            source: TorrentSource::magnet(
                "magnet:?xt=urn:btih:C9E15763F722F23E98A29DECDFAE341B98D53056&dn=demo+payload",
            ),
            download_dir: dir.to_path_buf(),
            rate_limit: RateLimit::default(),
        }
    }

    #[tokio::test]
    async fn add_writes_payload_and_scripts_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = SimSession::default();
        session.add(&request(dir.path())).await.expect("add");

        assert!(dir.path().join("demo payload.bin").is_file());

        let first = session.poll_events().await.expect("poll");
        assert!(matches!(first[0], EngineEvent::Ready { .. }));
        match &first[1] {
            EngineEvent::MetadataResolved { metadata, .. } => {
                assert_eq!(metadata.name, "demo payload");
                assert_eq!(
                    metadata.infohash,
                    "c9e15763f722f23e98a29decdfae341b98d53056"
                );
                assert_eq!(metadata.files.len(), 1);
            }
            other => panic!("expected metadata event, got {other:?}"),
        }

        let second = session.poll_events().await.expect("poll");
        assert!(matches!(
            second[1],
            EngineEvent::Progress { ref progress, .. } if progress.progress_pct == 50.0
        ));

        let third = session.poll_events().await.expect("poll");
        assert!(matches!(third[1], EngineEvent::Completed { .. }));

        // Script exhausted: subsequent polls are quiet.
        assert!(session.poll_events().await.expect("poll").is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let mut session = SimSession::default();
        let unknown = JobId::parse("missing").expect("id");
        session.remove(&unknown, false).await.expect("remove");
    }

    #[test]
    fn magnet_params_are_extracted() {
        assert_eq!(
            magnet_param("magnet:?xt=urn:btih:abc&dn=name", "dn").as_deref(),
            Some("name")
        );
        assert_eq!(magnet_param("magnet:?dn=", "dn"), None);
        assert_eq!(magnet_param("magnet:?xt=urn:btih:abc", "dn"), None);
    }
}
