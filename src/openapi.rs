// src/openapi.rs

use utoipa::OpenApi;

use crate::{
    handlers::{health, monitoring, recordings, review, sessions, signals},
    models::{
        activity::{ActivityEvent, AutomaticAction, EventSource, Severity, SuspiciousActivityRequest},
        analytics::{
            AnalyticsSummary, LiveSessionView, RiskDistribution, SessionSummary, SessionUpdate,
            Timeframe, ViolationCount,
        },
        recording::{
            RecordingChunkRequest, RecordingChunkResponse, RecordingSummary, RecordingTrack,
            RecordingType,
        },
        review::{ProctorReview, ReviewDecision, SubmitReviewRequest},
        session::{
            EndSessionRequest, InitializeSessionRequest, InitializeSessionResponse, NoFaceStreak,
            ProctorConfig, ProctoringSession, RecordingQuality, RiskLevel, SessionStatus,
            SessionStatusResponse, StartSessionRequest, SystemCheck, SystemCheckResponse,
        },
        signal::{
            BiometricSample, BiometricSampleRequest, FaceDetection, ScreenActivity,
            ScreenActivityRequest, SignalDecision,
        },
    },
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Exam Proctoring API", description = "Proctoring session lifecycle and risk engine"),
    paths(
        health::health,
        sessions::initialize_session,
        sessions::start_session,
        sessions::system_check,
        sessions::end_session,
        sessions::get_session,
        signals::record_biometric,
        signals::record_screen_activity,
        signals::report_suspicious_activity,
        review::submit_review,
        recordings::register_chunk,
        monitoring::live_monitoring,
        monitoring::assignment_sessions,
        monitoring::analytics_summary,
    ),
    components(schemas(
        health::HealthResponse,
        ActivityEvent,
        AutomaticAction,
        EventSource,
        Severity,
        SuspiciousActivityRequest,
        AnalyticsSummary,
        LiveSessionView,
        RiskDistribution,
        SessionSummary,
        SessionUpdate,
        Timeframe,
        ViolationCount,
        RecordingChunkRequest,
        RecordingChunkResponse,
        RecordingSummary,
        RecordingTrack,
        RecordingType,
        ProctorReview,
        ReviewDecision,
        SubmitReviewRequest,
        EndSessionRequest,
        InitializeSessionRequest,
        InitializeSessionResponse,
        NoFaceStreak,
        ProctorConfig,
        ProctoringSession,
        RecordingQuality,
        RiskLevel,
        SessionStatus,
        SessionStatusResponse,
        StartSessionRequest,
        SystemCheck,
        SystemCheckResponse,
        BiometricSample,
        BiometricSampleRequest,
        FaceDetection,
        ScreenActivity,
        ScreenActivityRequest,
        SignalDecision,
    ))
)]
pub struct ApiDoc;
