//! Route handlers for the control surface.

use std::io::ErrorKind;
use std::path::{Component, PathBuf};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use davit_pipeline::{JobRequest, JobStatusView, PipelineError, collect_files};
use davit_torrent_core::{JobId, TorrentSource};
use serde::{Deserialize, Serialize};
use serde_json::json;
use systemstat::{Platform, System};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AgentState;

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) enum JobType {
    #[serde(rename = "magnet")]
    Magnet,
    #[serde(rename = "torrent-file")]
    TorrentFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartBody {
    job_id: Option<String>,
    #[serde(rename = "type", default)]
    job_type: Option<JobType>,
    magnet_uri: Option<String>,
    torrent_base64: Option<String>,
    callback_url: Option<String>,
    callback_secret: Option<String>,
    correlation_id: Option<String>,
}

/// `POST /start`: validate, register, detach the pipeline, reply 202.
///
/// The pipeline is never awaited here: outcomes are observable only through
/// callbacks and `/status`.
pub(crate) async fn start_job(
    State(state): State<AgentState>,
    Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id_raw = body
        .job_id
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation("jobId is required".to_string()))?;
    let callback_url = body
        .callback_url
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation("callbackUrl is required".to_string()))?;
    let job_id = parse_job_id(&job_id_raw)?;

    let source = match body.job_type.unwrap_or(JobType::Magnet) {
        JobType::Magnet => {
            let uri = body
                .magnet_uri
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    ApiError::Validation("magnetUri is required for magnet jobs".to_string())
                })?;
            TorrentSource::magnet(uri)
        }
        JobType::TorrentFile => {
            let encoded = body
                .torrent_base64
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    ApiError::Validation(
                        "torrentBase64 is required for torrent-file jobs".to_string(),
                    )
                })?;
            let bytes = BASE64.decode(encoded.as_bytes()).map_err(|_| {
                ApiError::Validation("torrentBase64 is not valid base64".to_string())
            })?;
            TorrentSource::metainfo(bytes)
        }
    };

    let request = JobRequest {
        job_id: job_id.clone(),
        source,
        download_dir: state.settings.download_root.join(job_id.as_str()),
        callback_url,
        callback_secret: body.callback_secret.unwrap_or_default(),
        correlation_id: body
            .correlation_id
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    };
    state.pipeline.launch(request).await.map_err(|err| match err {
        PipelineError::Conflict { job_id } => ApiError::Conflict(job_id.to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "jobId": job_id.as_str(), "status": "accepted" })),
    ))
}

/// `POST /stop/{job_id}`: idempotent stop; unknown jobs still succeed.
pub(crate) async fn stop_job(
    State(state): State<AgentState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    state.pipeline.stop(&job_id).await;
    Ok(Json(json!({ "jobId": job_id.as_str(), "stopped": true })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    job_id: String,
    #[serde(flatten)]
    view: JobStatusView,
}

/// `GET /status/{job_id}`: registry status plus engine progress.
pub(crate) async fn job_status(
    State(state): State<AgentState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let view = state
        .pipeline
        .status(&job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;
    Ok(Json(StatusResponse {
        job_id: job_id.to_string(),
        view,
    }))
}

/// `GET /files/{job_id}`: list the job's files from local disk.
pub(crate) async fn list_files(
    State(state): State<AgentState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let dir = state.settings.download_root.join(job_id.as_str());
    if !dir.is_dir() {
        return Err(ApiError::NotFound(format!("job {job_id}")));
    }
    let files = collect_files(&dir);
    Ok(Json(json!({ "jobId": job_id.as_str(), "files": files })))
}

/// `GET /download/{job_id}/{*path}`: serve one file from the job's
/// directory. Any path that would escape it is rejected with 403.
pub(crate) async fn download_file(
    State(state): State<AgentState>,
    Path((job_id, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let relative = PathBuf::from(&path);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::PathTraversal);
    }

    let root = state.settings.download_root.join(job_id.as_str());
    let canonical_root = root
        .canonicalize()
        .map_err(|_| ApiError::NotFound(format!("job {job_id}")))?;
    let canonical_target = root
        .join(&relative)
        .canonicalize()
        .map_err(|_| ApiError::NotFound(format!("file {path}")))?;
    // Symlinks inside the payload could still point outside the job root.
    if !canonical_target.starts_with(&canonical_root) {
        return Err(ApiError::PathTraversal);
    }

    let bytes = tokio::fs::read(&canonical_target)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to read file: {err}")))?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

/// `DELETE /cleanup/{job_id}`: remove the job's directory from disk.
pub(crate) async fn cleanup_job(
    State(state): State<AgentState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let dir = state.settings.download_root.join(job_id.as_str());
    let removed = match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            return Err(ApiError::Internal(format!("cleanup failed: {err}")));
        }
    };
    Ok(Json(json!({ "jobId": job_id.as_str(), "removed": removed })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryReport {
    free_bytes: u64,
    total_bytes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    worker_id: String,
    active_jobs: usize,
    max_jobs: usize,
    capacity_pct: f64,
    memory: MemoryReport,
    uptime_seconds: u64,
}

/// `GET /health`: capacity percentage, memory, uptime.
pub(crate) async fn health(State(state): State<AgentState>) -> impl IntoResponse {
    let active_jobs = state.pipeline.active_jobs().await;
    let max_jobs = state.settings.max_concurrent_jobs;
    #[allow(clippy::cast_precision_loss)]
    let capacity_pct = (active_jobs as f64 / max_jobs.max(1) as f64) * 100.0;

    let memory = System::new().memory().map_or(
        MemoryReport {
            free_bytes: 0,
            total_bytes: 0,
        },
        |memory| MemoryReport {
            free_bytes: memory.free.as_u64(),
            total_bytes: memory.total.as_u64(),
        },
    );

    Json(HealthResponse {
        status: "ok",
        worker_id: state.settings.worker_id.clone(),
        active_jobs,
        max_jobs,
        capacity_pct,
        memory,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw)
        .map_err(|err| ApiError::Validation(format!("jobId rejected: {}", err.reason)))
}
