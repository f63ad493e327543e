// src/models/activity.rs

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Activity tags are lowercase snake_case words, e.g. `tab_switch`.
pub static ACTIVITY_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,64}$").expect("static activity type pattern"));

/// Severity assigned by the classifier. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action taken at the moment an event was recorded.
/// Ordered so that `max` picks the stronger reaction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AutomaticAction {
    #[default]
    None,
    Warning,
    Flag,
    Terminate,
}

impl AutomaticAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AutomaticAction::None => "none",
            AutomaticAction::Warning => "warning",
            AutomaticAction::Flag => "flag",
            AutomaticAction::Terminate => "terminate",
        }
    }
}

impl fmt::Display for AutomaticAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an event came from: reported directly by the client, or derived
/// server-side from a raw biometric / screen-activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Reported,
    Biometric,
    ScreenActivity,
}

/// Immutable audit record of one detected suspicious behavior.
///
/// Events are historical facts: once appended to a session they are never
/// recomputed, even if the policy table changes later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// 1-based position in the session's log.
    pub sequence: u64,

    /// Open-ended activity tag (`tab_switch`, `multiple_faces`, ...).
    #[serde(rename = "type")]
    pub activity_type: String,

    pub severity: Severity,

    /// Sanitized free text supplied with the signal.
    pub details: String,

    /// Server arrival time.
    pub timestamp: DateTime<Utc>,

    pub automatic_action: AutomaticAction,

    /// Score delta applied when this event was recorded (zero or negative).
    pub score_impact: i32,

    pub source: EventSource,
}

/// DTO for `POST /sessions/{id}/suspicious-activity`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousActivityRequest {
    #[serde(rename = "type")]
    #[validate(regex(path = *ACTIVITY_TYPE_RE, message = "Activity type must be 1-64 chars of [a-z0-9_]."))]
    pub activity_type: String,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub details: String,

    /// Client-side severity hint. Logged, never trusted.
    #[serde(default)]
    pub severity: Option<Severity>,
}
