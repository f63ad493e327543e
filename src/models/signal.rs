// src/models/signal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{
    activity::{ActivityEvent, AutomaticAction},
    session::{RiskLevel, SessionStatus},
};

/// Output of the external face detector for one webcam frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceDetection {
    pub face_count: u32,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

/// DTO for `POST /sessions/{id}/biometric-data`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BiometricSampleRequest {
    #[validate(custom(function = validate_face_detection))]
    pub face_detection: FaceDetection,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub eye_tracking: Option<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub environment_audio: Option<serde_json::Value>,
}

fn validate_face_detection(face: &FaceDetection) -> Result<(), validator::ValidationError> {
    if !(0.0..=1.0).contains(&face.confidence) {
        return Err(validator::ValidationError::new("confidence_out_of_range"));
    }
    Ok(())
}

/// Raw biometric record kept for forensic review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BiometricSample {
    pub face_detection: FaceDetection,
    #[schema(value_type = Option<Object>)]
    pub eye_tracking: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub environment_audio: Option<serde_json::Value>,
    pub received_at: DateTime<Utc>,
}

/// DTO for `POST /sessions/{id}/screen-activity`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreenActivityRequest {
    #[validate(length(min = 1, max = 64))]
    pub action: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub details: String,
    /// How long the condition lasted, in milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Raw screen/focus record kept for forensic review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreenActivity {
    pub action: String,
    pub details: String,
    pub duration: Option<u64>,
    pub received_at: DateTime<Utc>,
}

/// Decision returned synchronously to the signal's caller.
///
/// `should_terminate` means the client must force-submit the exam; a `flag`
/// action should surface a warning banner.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalDecision {
    pub action: AutomaticAction,
    pub should_terminate: bool,
    /// Events appended by this signal, in log order. May be empty for raw
    /// samples that crossed no threshold.
    pub events: Vec<ActivityEvent>,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub status: SessionStatus,
}
