// src/handlers/sessions.rs

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
    models::session::{
        EndSessionRequest, InitializeSessionRequest, InitializeSessionResponse, ProctoringSession,
        SessionStatusResponse, StartSessionRequest, SystemCheck, SystemCheckResponse,
    },
    services::ProctoringService,
};

/// Creates a proctoring session for one (assignment, student) attempt.
///
/// The proctoring config is snapshotted here; later edits to the assignment
/// never reach this session.
#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/initialize",
    request_body = InitializeSessionRequest,
    responses(
        (status = 201, body = InitializeSessionResponse),
        (status = 409, description = "An open session already exists for this attempt")
    ),
    tag = "sessions"
)]
pub async fn initialize_session(
    State(service): State<Arc<ProctoringService>>,
    Json(payload): Json<InitializeSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = service.initialize(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(InitializeSessionResponse {
            session_id: session.session_id,
            config: session.config,
        }),
    ))
}

/// Starts the exam once the client's system check satisfies the config.
#[utoipa::path(
    put,
    path = "/api/proctoring/sessions/{id}/start",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, body = SessionStatusResponse),
        (status = 409, description = "Session is not in initialized state"),
        (status = 422, description = "System requirements not met")
    ),
    tag = "sessions"
)]
pub async fn start_session(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = service.start(id, payload.system_check).await?;
    Ok(Json(SessionStatusResponse::from(&session)))
}

/// Records a pre-start capability probe.
#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/system-check",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SystemCheck,
    responses((status = 200, body = SystemCheckResponse)),
    tag = "sessions"
)]
pub async fn system_check(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SystemCheck>,
) -> Result<impl IntoResponse, AppError> {
    let result = service.system_check(id, payload).await?;
    Ok(Json(result))
}

/// Ends an active session (`exam_completed`, `time_expired`, ...).
#[utoipa::path(
    put,
    path = "/api/proctoring/sessions/{id}/end",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = EndSessionRequest,
    responses((status = 200, body = SessionStatusResponse)),
    tag = "sessions"
)]
pub async fn end_session(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EndSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = service.end(id, &payload.reason).await?;
    Ok(Json(SessionStatusResponse::from(&session)))
}

/// Full session record, including the ordered activity log.
#[utoipa::path(
    get,
    path = "/api/proctoring/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, body = ProctoringSession),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = service.get_session(id).await?;
    Ok(Json(session))
}
