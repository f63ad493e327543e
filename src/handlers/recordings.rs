// src/handlers/recordings.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::recording::{RecordingChunkRequest, RecordingChunkResponse},
    services::ProctoringService,
};

/// Registers an uploaded media chunk.
///
/// The bytes go to the external media store; this only records which chunk
/// belongs to which session and time window.
#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/recordings/chunks",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = RecordingChunkRequest,
    responses((status = 201, body = RecordingChunkResponse)),
    tag = "recordings"
)]
pub async fn register_chunk(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordingChunkRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = service.register_chunk(id, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
