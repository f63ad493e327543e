// src/models/analytics.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{
    activity::ActivityEvent,
    session::{RiskLevel, SessionStatus},
};

/// Look-back window for analytics queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Timeframe {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl Timeframe {
    /// Earliest `createdAt` included in the window, or `None` for no bound.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Day => Some(now - Duration::hours(24)),
            Timeframe::Week => Some(now - Duration::days(7)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::All => None,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LiveMonitoringParams {
    pub assignment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AssignmentSessionParams {
    pub status: Option<SessionStatus>,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalyticsParams {
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub timeframe: Timeframe,
}

/// Row of the live monitoring board.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveSessionView {
    pub session_id: Uuid,
    pub assignment_id: String,
    pub student_id: String,
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds since `startTime`.
    pub duration: i64,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub violation_count: u32,
    pub last_activity: Option<ActivityEvent>,
}

/// Short per-session digest for assignment listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub assignment_id: String,
    pub student_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end (or now, while active).
    pub duration: Option<i64>,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub violation_count: u32,
    pub violations: Vec<ViolationCount>,
    pub reviewed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCount {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RiskDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

/// Fleet-wide numbers for the faculty dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_sessions: u64,
    pub active_sessions: u64,
    /// Sessions that reached `ended` or `terminated`.
    pub completed_sessions: u64,
    pub terminated_sessions: u64,
    pub flagged_sessions: u64,
    /// Mean score over completed sessions; 100 when there are none.
    pub average_security_score: f64,
    pub risk_distribution: RiskDistribution,
    pub common_violations: Vec<ViolationCount>,
}

/// Pushed on the live stream after every session mutation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: Uuid,
    pub assignment_id: String,
    pub student_id: String,
    pub status: SessionStatus,
    pub security_score: u8,
    pub risk_level: RiskLevel,
    pub violation_count: u32,
    pub last_event: Option<ActivityEvent>,
}
