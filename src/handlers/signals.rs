// src/handlers/signals.rs

//! Signal ingestion. Each handler returns the classifier's decision so the
//! browser can react immediately (banner on `flag`, force-submit on
//! `shouldTerminate`).

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        activity::SuspiciousActivityRequest,
        signal::{BiometricSampleRequest, ScreenActivityRequest, SignalDecision},
    },
    services::ProctoringService,
};

#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/biometric-data",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = BiometricSampleRequest,
    responses((status = 200, body = SignalDecision)),
    tag = "signals"
)]
pub async fn record_biometric(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BiometricSampleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let decision = service.record_biometric(id, payload).await?;
    Ok(Json(decision))
}

#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/screen-activity",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ScreenActivityRequest,
    responses((status = 200, body = SignalDecision)),
    tag = "signals"
)]
pub async fn record_screen_activity(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScreenActivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let decision = service.record_screen_activity(id, payload).await?;
    Ok(Json(decision))
}

/// Reports a suspicious activity. The `severity` hint in the body is ignored;
/// the stored severity is always the classifier's.
#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/suspicious-activity",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SuspiciousActivityRequest,
    responses(
        (status = 200, body = SignalDecision),
        (status = 409, description = "Session is not active or already closed")
    ),
    tag = "signals"
)]
pub async fn report_suspicious_activity(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SuspiciousActivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let decision = service.report_suspicious_activity(id, payload).await?;
    Ok(Json(decision))
}
