// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::session::SessionStatus;

/// Domain errors raised by the session state machine and its storage.
///
/// Every variant is a policy violation the caller must react to; none is
/// retried or swallowed inside the service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProctorError {
    #[error("proctoring session {0} not found")]
    SessionNotFound(Uuid),

    #[error("an open proctoring session already exists for assignment '{assignment_id}' and student '{student_id}'")]
    DuplicateSession {
        assignment_id: String,
        student_id: String,
    },

    #[error("cannot {operation} while session is {status}")]
    InvalidSessionState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("system requirements not met: missing {}", .missing.join(", "))]
    SystemRequirementsNotMet { missing: Vec<String> },

    #[error("session is {status}; only a review may be submitted")]
    SessionClosed { status: SessionStatus },

    #[error("session {0} has already been reviewed")]
    AlreadyReviewed(Uuid),

    #[error("session {0} was modified concurrently; retry the request")]
    ConcurrentUpdate(Uuid),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl ProctorError {
    /// Stable machine-readable code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ProctorError::SessionNotFound(_) => "session_not_found",
            ProctorError::DuplicateSession { .. } => "duplicate_session",
            ProctorError::InvalidSessionState { .. } => "invalid_session_state",
            ProctorError::SystemRequirementsNotMet { .. } => "system_requirements_not_met",
            ProctorError::SessionClosed { .. } => "session_closed",
            ProctorError::AlreadyReviewed(_) => "already_reviewed",
            ProctorError::ConcurrentUpdate(_) => "concurrent_update",
            ProctorError::Validation(_) => "validation_error",
            ProctorError::Storage(_) => "storage_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProctorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ProctorError::DuplicateSession { .. }
            | ProctorError::InvalidSessionState { .. }
            | ProctorError::SessionClosed { .. }
            | ProctorError::AlreadyReviewed(_)
            | ProctorError::ConcurrentUpdate(_) => StatusCode::CONFLICT,
            ProctorError::SystemRequirementsNotMet { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ProctorError::Validation(_) => StatusCode::BAD_REQUEST,
            ProctorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ProctorError {
    fn from(err: sqlx::Error) -> Self {
        ProctorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ProctorError {
    fn from(err: serde_json::Error) -> Self {
        ProctorError::Storage(err.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // Session lifecycle and policy errors, mapped per variant.
    Proctoring(ProctorError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Proctoring(err) => {
                let status = err.status_code();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Proctoring storage failure: {}", err);
                    (status, err.code(), "Internal Server Error".to_string())
                } else {
                    (status, err.code(), err.to_string())
                }
            }
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<ProctorError> for AppError {
    fn from(err: ProctorError) -> Self {
        AppError::Proctoring(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        let id = Uuid::new_v4();
        assert_eq!(
            ProctorError::SessionNotFound(id).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProctorError::AlreadyReviewed(id).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ProctorError::SystemRequirementsNotMet {
                missing: vec!["camera".to_string()]
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn missing_session_renders_as_404_with_code() {
        let response = AppError::from(ProctorError::SessionNotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let stale = AppError::from(ProctorError::ConcurrentUpdate(Uuid::new_v4())).into_response();
        assert_eq!(stale.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn requirements_message_lists_missing_capabilities() {
        let err = ProctorError::SystemRequirementsNotMet {
            missing: vec!["camera".to_string(), "microphone".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "system requirements not met: missing camera, microphone"
        );
        assert_eq!(err.code(), "system_requirements_not_met");
    }
}
