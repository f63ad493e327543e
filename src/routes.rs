// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{health, monitoring, recordings, review, sessions, signals},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Session lifecycle and signal ingestion under `/api/proctoring/sessions`.
/// * Faculty read paths (live board, assignment listing, analytics).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let session_routes = Router::new()
        .route("/initialize", post(sessions::initialize_session))
        .route("/live/monitoring", get(monitoring::live_monitoring))
        .route("/live/stream", get(monitoring::live_stream))
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/start", put(sessions::start_session))
        .route("/{id}/system-check", post(sessions::system_check))
        .route("/{id}/end", put(sessions::end_session))
        .route("/{id}/biometric-data", post(signals::record_biometric))
        .route("/{id}/screen-activity", post(signals::record_screen_activity))
        .route(
            "/{id}/suspicious-activity",
            post(signals::report_suspicious_activity),
        )
        .route("/{id}/review", post(review::submit_review))
        .route("/{id}/recordings/chunks", post(recordings::register_chunk));

    let proctoring_routes = Router::new()
        .nest("/sessions", session_routes)
        .route(
            "/assignments/{id}/sessions",
            get(monitoring::assignment_sessions),
        )
        .route("/analytics/summary", get(monitoring::analytics_summary));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/openapi.json", get(health::openapi_json))
        .nest("/api/proctoring", proctoring_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
