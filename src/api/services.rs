use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use http_body_util::BodyExt;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{
    models::{HealthResponse, JobResponse, MetadataQuery, SubmitJobRequest},
    state::AppState,
    utils::{content_disposition, parse_content_type, validate_body_size},
    validation::validate_submission,
};
use crate::api::error::ApiError;
use crate::service::Submission;

/// Job submission endpoint (POST /api/jobs)
///
/// Accepts `{ sourceUrl, formatSelector?, outputNameHint? }` and answers as
/// soon as the job is registered and queued; the download runs on the worker
/// pool.
///
/// ## Flow:
/// 1. Validate Content-Type (application/json, optional charset)
/// 2. Read the body (already decompressed by the middleware), enforce
///    `server.max_payload_bytes`
/// 3. Deserialize and run the shape checks
/// 4. Hand the submission to the service, which rejects blank or non-http(s)
///    URLs before anything is spawned
/// 5. Return 202 Accepted with the job id, filename template and QUEUED status
///
/// A full queue is reported as 503; nothing is retried on the client's behalf.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let body_bytes = read_body(body, state.config.server.max_payload_bytes.as_usize()).await?;

    let request: SubmitJobRequest = serde_json::from_slice(&body_bytes)?;
    validate_submission(&request).map_err(|err| ApiError::InvalidPayload(err.to_string()))?;

    let job = state
        .service
        .submit(Submission {
            source_url: request.source_url,
            format_selector: request.format_selector,
            output_name_hint: request.output_name_hint,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(JobResponse::from(job))))
}

/// Reads request body and validates size
///
/// Decompression is handled by RequestDecompressionLayer, so the limit
/// applies to the decoded payload.
async fn read_body(body: Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Job status endpoint (GET /api/jobs/{job_id})
///
/// A failed job is still a successful query: the failure is in the
/// `status`/`message` fields.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.service.job(&job_id).await?;
    Ok((StatusCode::OK, Json(JobResponse::from(job))))
}

/// Live status feed (GET /api/jobs/{job_id}/progress)
///
/// Server-sent events whose data is `status=<STATUS>|message=<MESSAGE>`.
/// Only changes are sent; the stream closes after the terminal status. An
/// unknown job gets a single `status=UNKNOWN` event.
pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    debug!(job_id = %job_id, "Status feed opened");
    let stream = state
        .service
        .status_stream(&job_id)
        .await
        .map(|line| Ok(Event::default().data(line)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Progress snapshot endpoint (GET /api/jobs/{job_id}/snapshot)
///
/// Latest percentage, speed and ETA. Finished snapshots disappear once
/// their grace period has passed, after which this returns 404.
pub async fn job_snapshot(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.service.progress(&job_id).await?;
    Ok(Json(snapshot))
}

/// File download endpoint (GET /api/jobs/{job_id}/file)
///
/// The file is streamed from disk with its `Content-Length`. 425 while the
/// job is queued or running, 409 when it failed.
pub async fn job_file(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.service.artifact(&job_id).await?;
    let disposition = HeaderValue::from_str(&content_disposition(&artifact.file_name))
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(artifact.size)),
        ],
        Body::from_stream(ReaderStream::new(artifact.file)),
    )
        .into_response())
}

/// Metadata endpoint (GET /api/metadata?url=...)
///
/// Only YouTube watch/short links are accepted. Results are cached per
/// video id.
pub async fn get_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metadata = state.service.metadata(&query.url).await?;
    Ok(Json(metadata.as_ref().clone()))
}

/// Health check endpoint (GET /health)
///
/// Components:
/// - api: this HTTP server
/// - downloader: the external tool answers `--version`
/// - job_broker: the worker pool is still consuming
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.service.health().await;

    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("downloader".to_string(), label(report.downloader).to_string());
    components.insert("job_broker".to_string(), label(report.job_broker).to_string());

    let status_code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: label(report.is_healthy()).to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        pending_jobs: report.pending_jobs,
        metrics: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}

fn label(healthy: bool) -> &'static str {
    if healthy { "healthy" } else { "unhealthy" }
}
