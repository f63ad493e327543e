// src/services/reporting.rs

//! Read-only projections for the faculty dashboards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    error::ProctorError,
    models::{
        activity::AutomaticAction,
        analytics::{
            AnalyticsParams, AnalyticsSummary, AssignmentSessionParams, LiveSessionView,
            RiskDistribution, SessionSummary, ViolationCount,
        },
        review::ReviewDecision,
        session::{ProctoringSession, RiskLevel, SessionStatus},
    },
    services::proctoring::ProctoringService,
    store::SessionFilter,
};

/// Histogram of event types, most frequent first; ties broken by type name.
pub fn violation_histogram<'a, I>(sessions: I) -> Vec<ViolationCount>
where
    I: IntoIterator<Item = &'a ProctoringSession>,
{
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for session in sessions {
        for event in &session.suspicious_activities {
            *counts.entry(event.activity_type.as_str()).or_default() += 1;
        }
    }

    let mut histogram: Vec<ViolationCount> = counts
        .into_iter()
        .map(|(activity_type, count)| ViolationCount {
            activity_type: activity_type.to_string(),
            count,
        })
        .collect();
    histogram.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.activity_type.cmp(&b.activity_type))
    });
    histogram
}

/// A session counts as flagged if any event flagged or terminated it, or a
/// reviewer marked it.
pub fn is_flagged(session: &ProctoringSession) -> bool {
    let flagged_by_event = session
        .suspicious_activities
        .iter()
        .any(|e| e.automatic_action >= AutomaticAction::Flag);
    let flagged_by_review = session.proctor_review.as_ref().is_some_and(|r| {
        matches!(r.decision, ReviewDecision::Flagged | ReviewDecision::Disqualified)
    });
    flagged_by_event || flagged_by_review
}

fn duration_secs(session: &ProctoringSession, now: DateTime<Utc>) -> Option<i64> {
    let start = session.start_time?;
    let end = session.end_time.unwrap_or(now);
    Some((end - start).num_seconds().max(0))
}

pub fn live_view(session: &ProctoringSession, now: DateTime<Utc>) -> LiveSessionView {
    LiveSessionView {
        session_id: session.session_id,
        assignment_id: session.assignment_id.clone(),
        student_id: session.student_id.clone(),
        start_time: session.start_time,
        duration: duration_secs(session, now).unwrap_or(0),
        security_score: session.security_score,
        risk_level: session.risk_level,
        violation_count: session.violation_count,
        last_activity: session.last_event().cloned(),
    }
}

pub fn session_summary(session: &ProctoringSession, now: DateTime<Utc>) -> SessionSummary {
    SessionSummary {
        session_id: session.session_id,
        assignment_id: session.assignment_id.clone(),
        student_id: session.student_id.clone(),
        status: session.status,
        created_at: session.created_at,
        start_time: session.start_time,
        end_time: session.end_time,
        duration: duration_secs(session, now),
        security_score: session.security_score,
        risk_level: session.risk_level,
        violation_count: session.violation_count,
        violations: violation_histogram([session]),
        reviewed: session.proctor_review.is_some(),
    }
}

/// Fleet-wide summary. Zero sessions yield zero counts and a score of 100.
pub fn summarize(sessions: &[ProctoringSession]) -> AnalyticsSummary {
    let mut summary = AnalyticsSummary {
        total_sessions: sessions.len() as u64,
        active_sessions: 0,
        completed_sessions: 0,
        terminated_sessions: 0,
        flagged_sessions: 0,
        average_security_score: 100.0,
        risk_distribution: RiskDistribution::default(),
        common_violations: violation_histogram(sessions),
    };

    let mut completed_score_total: u64 = 0;
    for session in sessions {
        match session.status {
            SessionStatus::Active => summary.active_sessions += 1,
            SessionStatus::Ended => summary.completed_sessions += 1,
            SessionStatus::Terminated => {
                summary.completed_sessions += 1;
                summary.terminated_sessions += 1;
            }
            SessionStatus::Uninitialized | SessionStatus::Initialized => {}
        }
        if session.status.is_terminal() {
            completed_score_total += u64::from(session.security_score);
        }
        if is_flagged(session) {
            summary.flagged_sessions += 1;
        }
        match session.risk_level {
            RiskLevel::Low => summary.risk_distribution.low += 1,
            RiskLevel::Medium => summary.risk_distribution.medium += 1,
            RiskLevel::High => summary.risk_distribution.high += 1,
            RiskLevel::Critical => summary.risk_distribution.critical += 1,
        }
    }

    if summary.completed_sessions > 0 {
        let mean = completed_score_total as f64 / summary.completed_sessions as f64;
        summary.average_security_score = (mean * 10.0).round() / 10.0;
    }
    summary
}

impl ProctoringService {
    /// Active sessions, optionally for one assignment.
    pub async fn live_monitoring(
        &self,
        assignment_id: Option<String>,
    ) -> Result<Vec<LiveSessionView>, ProctorError> {
        let filter = SessionFilter {
            assignment_id,
            status: Some(SessionStatus::Active),
            ..SessionFilter::default()
        };
        let now = Utc::now();
        let sessions = self.store().list(&filter).await?;
        Ok(sessions.iter().map(|s| live_view(s, now)).collect())
    }

    pub async fn assignment_sessions(
        &self,
        assignment_id: String,
        params: AssignmentSessionParams,
    ) -> Result<Vec<SessionSummary>, ProctorError> {
        let filter = SessionFilter {
            assignment_id: Some(assignment_id),
            status: params.status,
            risk_level: params.risk_level,
            created_after: None,
        };
        let now = Utc::now();
        let sessions = self.store().list(&filter).await?;
        Ok(sessions.iter().map(|s| session_summary(s, now)).collect())
    }

    pub async fn analytics_summary(&self, params: AnalyticsParams) -> Result<AnalyticsSummary, ProctorError> {
        let filter = SessionFilter {
            assignment_id: params.assignment_id,
            created_after: params.timeframe.since(Utc::now()),
            ..SessionFilter::default()
        };
        let sessions = self.store().list(&filter).await?;
        Ok(summarize(&sessions))
    }
}
