// src/handlers/monitoring.rs

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, stream};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    error::AppError,
    models::analytics::{
        AnalyticsParams, AnalyticsSummary, AssignmentSessionParams, LiveMonitoringParams,
        LiveSessionView, SessionSummary,
    },
    services::ProctoringService,
};

/// Active sessions with elapsed duration. Safe to poll.
#[utoipa::path(
    get,
    path = "/api/proctoring/sessions/live/monitoring",
    params(LiveMonitoringParams),
    responses((status = 200, body = [LiveSessionView])),
    tag = "monitoring"
)]
pub async fn live_monitoring(
    State(service): State<Arc<ProctoringService>>,
    Query(params): Query<LiveMonitoringParams>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = service.live_monitoring(params.assignment_id).await?;
    Ok(Json(sessions))
}

/// Server-Sent Events feed of session updates, optionally for one assignment.
///
/// Slow consumers that fall behind skip the missed updates; the polling
/// endpoint stays authoritative.
pub async fn live_stream(
    State(service): State<Arc<ProctoringService>>,
    Query(params): Query<LiveMonitoringParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = service.subscribe();
    let filter = params.assignment_id;

    let updates = stream::unfold((rx, filter), |(mut rx, filter)| async move {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    if filter.as_deref().is_some_and(|a| a != update.assignment_id) {
                        continue;
                    }
                    let event = Event::default()
                        .event("session_update")
                        .json_data(&update)
                        .unwrap_or_else(|e| {
                            tracing::error!("Failed to encode session update: {:?}", e);
                            Event::default().comment("encoding error")
                        });
                    return Some((Ok(event), (rx, filter)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Live stream subscriber lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}

/// Sessions for one assignment, newest first.
#[utoipa::path(
    get,
    path = "/api/proctoring/assignments/{id}/sessions",
    params(("id" = String, Path, description = "Assignment id"), AssignmentSessionParams),
    responses((status = 200, body = [SessionSummary])),
    tag = "monitoring"
)]
pub async fn assignment_sessions(
    State(service): State<Arc<ProctoringService>>,
    Path(assignment_id): Path<String>,
    Query(params): Query<AssignmentSessionParams>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = service.assignment_sessions(assignment_id, params).await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/api/proctoring/analytics/summary",
    params(AnalyticsParams),
    responses((status = 200, body = AnalyticsSummary)),
    tag = "monitoring"
)]
pub async fn analytics_summary(
    State(service): State<Arc<ProctoringService>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let summary = service.analytics_summary(params).await?;
    Ok(Json(summary))
}
