// src/handlers/review.rs

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
    models::review::{ProctorReview, SubmitReviewRequest},
    services::ProctoringService,
};

/// Attaches the faculty decision to an ended or terminated session.
/// A second review is rejected with `already_reviewed`.
#[utoipa::path(
    post,
    path = "/api/proctoring/sessions/{id}/review",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SubmitReviewRequest,
    responses(
        (status = 201, body = ProctorReview),
        (status = 409, description = "Session still open or already reviewed")
    ),
    tag = "review"
)]
pub async fn submit_review(
    State(service): State<Arc<ProctoringService>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = service.review(id, payload).await?;
    let review = session
        .proctor_review
        .ok_or_else(|| AppError::InternalServerError("review missing after submit".to_string()))?;

    Ok((StatusCode::CREATED, Json(review)))
}
