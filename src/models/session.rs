// src/models/session.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    activity::ActivityEvent,
    recording::RecordingSummary,
    review::ProctorReview,
    signal::{BiometricSample, ScreenActivity},
};

/// Lifecycle state of a proctoring session.
///
/// `uninitialized -> initialized -> active -> {ended | terminated}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Initialized,
    Active,
    Ended,
    Terminated,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Terminated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Initialized => "initialized",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
            SessionStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uninitialized" => Ok(SessionStatus::Uninitialized),
            "initialized" => Ok(SessionStatus::Initialized),
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            "terminated" => Ok(SessionStatus::Terminated),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Coarse risk bucket derived from the security score and event history.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordingQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Proctoring options chosen when the assignment was created.
///
/// Copied into the session at initialization and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProctorConfig {
    pub webcam_required: bool,
    pub screen_recording: bool,
    pub face_detection: bool,
    pub browser_lockdown: bool,
    pub prevent_copy_paste: bool,
    pub prevent_right_click: bool,
    pub prevent_tab_switch: bool,
    pub audio_monitoring: bool,
    pub allow_calculator: bool,
    pub allow_notes: bool,
    /// Violation count at which the session is terminated. Zero disables the limit.
    pub max_suspicious_activities: u32,
    pub recording_quality: RecordingQuality,
    pub auto_terminate_on_critical: bool,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            webcam_required: true,
            screen_recording: false,
            face_detection: true,
            browser_lockdown: true,
            prevent_copy_paste: true,
            prevent_right_click: true,
            prevent_tab_switch: true,
            audio_monitoring: false,
            allow_calculator: false,
            allow_notes: false,
            max_suspicious_activities: 5,
            recording_quality: RecordingQuality::Medium,
            auto_terminate_on_critical: true,
        }
    }
}

/// Result of the client's pre-exam capability probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SystemCheck {
    pub camera: bool,
    pub microphone: bool,
    pub screen: bool,
    pub browser: bool,
}

/// Tracks a run of consecutive biometric samples with no face in frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoFaceStreak {
    pub since: Option<DateTime<Utc>>,
    pub raised: bool,
    pub escalated: bool,
}

/// One proctored attempt at one assignment by one student.
///
/// Persisted as a single record; `suspicious_activities` is append-only and
/// the scalar aggregates are always recomputed from it by the reducer in
/// `engine::machine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringSession {
    pub session_id: Uuid,
    pub assignment_id: String,
    pub student_id: String,
    pub config: ProctorConfig,
    #[schema(value_type = Object)]
    pub browser_info: serde_json::Value,
    #[schema(value_type = Object)]
    pub device_info: serde_json::Value,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub system_check: Option<SystemCheck>,
    pub suspicious_activities: Vec<ActivityEvent>,
    pub biometric_samples: Vec<BiometricSample>,
    pub screen_activity_log: Vec<ScreenActivity>,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub violation_count: u32,
    pub no_face_streak: NoFaceStreak,
    pub recordings: RecordingSummary,
    pub proctor_review: Option<ProctorReview>,
}

/// DTO for `POST /sessions/initialize`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeSessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub assignment_id: String,
    #[validate(length(min = 1, max = 128))]
    pub student_id: String,
    #[serde(default)]
    pub proctor_config: ProctorConfig,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub browser_info: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub device_info: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeSessionResponse {
    pub session_id: Uuid,
    pub config: ProctorConfig,
}

/// DTO for `PUT /sessions/{id}/start`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub system_check: SystemCheck,
}

/// DTO for `PUT /sessions/{id}/end`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EndSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub reason: String,
}

/// Outcome of a `system-check` signal.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemCheckResponse {
    pub requirements_met: bool,
    pub missing: Vec<String>,
}

/// Compact view of a session's current aggregates.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub violation_count: u32,
}

impl From<&ProctoringSession> for SessionStatusResponse {
    fn from(session: &ProctoringSession) -> Self {
        Self {
            session_id: session.session_id,
            status: session.status,
            start_time: session.start_time,
            end_time: session.end_time,
            security_score: session.security_score,
            risk_level: session.risk_level,
            violation_count: session.violation_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SessionStatus::Uninitialized,
            SessionStatus::Initialized,
            SessionStatus::Active,
            SessionStatus::Ended,
            SessionStatus::Terminated,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
        }
        assert!("paused".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn only_ended_and_terminated_are_terminal() {
        assert!(SessionStatus::Ended.is_terminal());
        assert!(SessionStatus::Terminated.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Initialized.is_terminal());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: ProctorConfig = serde_json::from_value(serde_json::json!({
            "maxSuspiciousActivities": 3,
            "autoTerminateOnCritical": false,
            "recordingQuality": "high"
        }))
        .unwrap();

        assert_eq!(config.max_suspicious_activities, 3);
        assert!(!config.auto_terminate_on_critical);
        assert_eq!(config.recording_quality, RecordingQuality::High);
        assert!(config.webcam_required);
    }
}
