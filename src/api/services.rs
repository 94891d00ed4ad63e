use std::collections::HashMap;

use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use super::{
    models::{
        CallbackQuery, CallbackResponse, DownloadFailedResponse, DownloadPayload,
        DownloadReadyResponse, HealthResponse, JobAcceptedResponse, PreviewPayload,
        PreviewResponse,
    },
    state::AppState,
    utils::{attachment_disposition, content_type_for},
    validation::validate_url_field,
};
use crate::api::error::ApiError;
use crate::artifacts::callback_name;
use crate::jobs::Completion;
use crate::relay::InlineResult;
use crate::strategy::DownloadRequest;

const MAX_JSON_BODY: usize = 64 * 1024;
const FILE_FIELD: &str = "file";

/// `POST /download`
///
/// Background mode (default) answers 202 with a job handle right away.
/// With `"wait": true` the attempts run inline: 200 with the file, 202 when
/// the request was escalated to the remote worker, 422 when every attempt
/// failed.
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let payload: DownloadPayload = read_json(&headers, body).await?;
    let request = prepare(&state, &payload.url)?;

    if !payload.wait {
        let job_id = state.relay.submit(request).await;
        info!(%job_id, url = %payload.url, "Download accepted");
        return Ok(accepted(job_id));
    }

    let response = match state.relay.download(&request).await {
        InlineResult::Ready {
            file_name,
            title,
            thumbnail_url,
        } => (
            StatusCode::OK,
            Json(DownloadReadyResponse {
                success: true,
                filename: file_name,
                title,
                thumbnail: thumbnail_url,
            }),
        )
            .into_response(),
        InlineResult::Deferred { job_id } => accepted(job_id),
        InlineResult::Failed { message } => unprocessable(message),
    };

    Ok(response)
}

/// `POST /preview`: title and thumbnail without downloading
pub async fn preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let payload: PreviewPayload = read_json(&headers, body).await?;
    let request = prepare(&state, &payload.url)?;

    let response = match state.relay.preview(&request).await {
        Ok(preview) => (
            StatusCode::OK,
            Json(PreviewResponse {
                title: preview.title,
                thumbnail: preview.thumbnail_url,
            }),
        )
            .into_response(),
        Err(message) => unprocessable(message),
    };

    Ok(response)
}

/// `GET /status/{job_id}`
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state
        .registry()
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;

    Ok((StatusCode::OK, Json(job)))
}

/// `POST /callback?job_id=…`: the remote worker delivers the file
///
/// The job must exist and still be pending. The upload is stored under a
/// sanitized name and the job becomes ready; a second delivery gets 409.
pub async fn receive_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let raw_id = query
        .job_id
        .ok_or_else(|| ApiError::InvalidPayload("job_id query parameter is required".into()))?;
    let job_id = parse_job_id(&raw_id)?;

    let job = state
        .registry()
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;
    if job.status.is_terminal() {
        return Err(ApiError::Conflict(format!("job {job_id} already finished")));
    }

    let mut multipart = multipart.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let limit = state.config.server.max_upload_bytes.as_u64() as usize;
    let (upload_name, data) = read_file_field(&mut multipart, limit).await?;

    let file_name = callback_name(job_id, Uuid::new_v4(), upload_name.as_deref());
    let size = state.artifacts.put(&file_name, data).await?;

    if let Err(e) = state
        .registry()
        .complete(job_id, Completion::file(&file_name))
        .await
    {
        // Lost the race against another delivery or expiry. The name is
        // unique to this upload.
        let _ = state.artifacts.delete(&file_name).await;
        return Err(e.into());
    }

    state.metrics().callback_received();
    info!(%job_id, file = %file_name, size, "Callback stored");

    Ok(Json(CallbackResponse {
        success: true,
        filename: file_name,
    }))
}

/// `GET /files/{filename}`: streams an artifact as an attachment
pub async fn serve_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.artifacts.open_stream(&file_name).await?;

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&file_name).to_string()),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (header::CONTENT_DISPOSITION, attachment_disposition(&file_name)),
    ];

    Ok((headers, Body::from_stream(artifact.stream)).into_response())
}

/// `GET /health`
///
/// 503 when the artifact area is gone. A missing remote worker is reported
/// but does not make the service unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    let storage_ok = tokio::fs::try_exists(state.artifacts.root())
        .await
        .unwrap_or(false);

    components.insert("api".to_string(), "healthy".to_string());
    components.insert(
        "artifact_store".to_string(),
        if storage_ok { "healthy" } else { "unhealthy" }.to_string(),
    );
    components.insert(
        "remote_worker".to_string(),
        if state.relay.remote_configured() {
            "configured"
        } else {
            "disabled"
        }
        .to_string(),
    );

    let status_code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if storage_ok { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: state.registry().len().await,
        metrics: state.metrics().snapshot(),
    };

    (status_code, Json(response))
}

fn accepted(job_id: Uuid) -> Response {
    (StatusCode::ACCEPTED, Json(JobAcceptedResponse::pending(job_id))).into_response()
}

fn unprocessable(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(DownloadFailedResponse {
            success: false,
            message,
        }),
    )
        .into_response()
}

fn prepare(state: &AppState, url: &str) -> Result<DownloadRequest, ApiError> {
    validate_url_field(url).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
    state
        .relay
        .prepare(url)
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::InvalidPayload(format!("invalid job id: {raw}")))
}

/// Validates Content-Type and decodes a bounded JSON body
async fn read_json<T: DeserializeOwned>(headers: &HeaderMap, body: Body) -> Result<T, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    super::utils::parse_content_type(content_type)?;

    let data = axum::body::to_bytes(body, MAX_JSON_BODY)
        .await
        .map_err(|_| ApiError::PayloadTooLarge {
            limit: MAX_JSON_BODY,
        })?;

    Ok(serde_json::from_slice(&data)?)
}

async fn read_file_field(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<(Option<String>, Bytes), ApiError> {
    let map_err = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge { limit }
        } else {
            ApiError::InvalidPayload(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(map_err)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let upload_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(map_err)?;
        if data.is_empty() {
            return Err(ApiError::InvalidPayload("uploaded file is empty".into()));
        }
        return Ok((upload_name, data));
    }

    Err(ApiError::InvalidPayload(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}
