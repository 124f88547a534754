use std::collections::HashMap;

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{
    models::{BatchAcceptedResponse, HealthResponse, TaskAcceptedResponse},
    state::AppState,
    utils::{attachment_disposition, content_type_for, parse_content_type, validate_filename},
};
use crate::api::error::ApiError;

/// Single URL submission (POST /api/download)
///
/// Body: `{"url": "<media url>"}`. Responds `202` with the new task id
/// without waiting for the download.
pub async fn submit_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let payload = read_json(&state, &headers, body).await?;

    let url = payload
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::InvalidPayload("provide a 'url' string field".to_string()))?;

    let task_id = state.dispatcher.submit_one(url)?;

    Ok((StatusCode::ACCEPTED, Json(TaskAcceptedResponse { task_id })))
}

/// Batch submission (POST /api/downloads)
///
/// Body: `{"links": [...]}` or `{"urls": [...]}`. Entries that are not
/// non-empty strings are skipped; the response maps every accepted task id
/// to its URL.
pub async fn submit_downloads(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let payload = read_json(&state, &headers, body).await?;

    let links = ["links", "urls"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_array))
        .find(|list| !list.is_empty())
        .ok_or_else(|| {
            ApiError::InvalidPayload("provide a 'links' array with one or more URLs".to_string())
        })?;

    let accepted = state.dispatcher.submit_many(links);

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAcceptedResponse::from(accepted)),
    ))
}

/// Progress of one task (GET /api/progress/{task_id})
///
/// Unknown ids answer `200` with the `unknown` sentinel so pollers never
/// have to special-case a 404.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    Json(state.ledger.get(&task_id))
}

/// Progress of every tracked task (GET /api/progress)
pub async fn get_all_progress(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.get_all())
}

/// Stream a converted file as an attachment (GET /downloads/{filename})
pub async fn serve_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    validate_filename(&filename)?;

    let path = state.config.server.downloads_dir.join(&filename);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(ApiError::NotFound(format!("file {filename}"))),
    };

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to open artifact");
        ApiError::NotFound(format!("file {filename}"))
    })?;

    debug!(filename = %filename, size = metadata.len(), "Serving artifact");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename).to_string())
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::CONTENT_DISPOSITION, attachment_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(response)
}

/// Health check endpoint (GET /health)
///
/// Reports worker pool liveness, task counts per stage and lifecycle
/// counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool_healthy = state.pool.is_healthy();

    let mut components = HashMap::new();
    components.insert(
        "worker_pool".to_string(),
        if pool_healthy { "ok" } else { "down" }.to_string(),
    );
    components.insert("ledger".to_string(), "ok".to_string());
    components.insert("extractor".to_string(), state.extractor_name.to_string());

    let response = HealthResponse {
        status: if pool_healthy { "ok" } else { "degraded" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        pool_size: state.pool.size(),
        queue_pending: state.pool.pending(),
        tasks: state.ledger.stats(),
        metrics: state.metrics.snapshot(),
    };

    let status = if pool_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Read a JSON request body, enforcing `server.max_body_bytes`
///
/// Decompression is handled by `RequestDecompressionLayer`, so the limit
/// applies to the decoded size.
async fn read_json(state: &AppState, headers: &HeaderMap, body: Body) -> Result<Value, ApiError> {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let content_type = content_type
            .to_str()
            .map_err(|_| ApiError::InvalidPayload("invalid Content-Type header".to_string()))?;
        parse_content_type(content_type)?;
    }

    let limit = state.config.server.max_body_bytes.as_usize();
    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(limit)
            } else {
                ApiError::InvalidPayload(format!("failed to read body: {err}"))
            }
        })?
        .to_bytes();

    if bytes.is_empty() {
        return Err(ApiError::InvalidPayload("JSON body required".to_string()));
    }

    let payload: Value = serde_json::from_slice(&bytes)?;
    if !payload.is_object() {
        return Err(ApiError::InvalidPayload("JSON body must be an object".to_string()));
    }

    Ok(payload)
}
