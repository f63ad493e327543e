// src/engine/risk.rs

use crate::models::{
    activity::{ActivityEvent, Severity},
    session::RiskLevel,
};

pub const INITIAL_SECURITY_SCORE: u8 = 100;

/// Applies a (non-positive) delta, flooring at zero.
pub fn apply_score_delta(score: u8, delta: i32) -> u8 {
    let next = (i32::from(score) + delta.min(0)).max(0);
    next.min(i32::from(score)) as u8
}

/// Buckets a session by score and by the worst events in its log.
///
/// A pure function of the log and the score; the stored `risk_level` is always
/// the output of this function after the latest append.
pub fn derive_risk_level(score: u8, events: &[ActivityEvent]) -> RiskLevel {
    let worst = events.iter().map(|e| e.severity).max();
    let violations = events
        .iter()
        .filter(|e| super::classifier::counts_as_violation(e.automatic_action))
        .count();

    if score <= 40 || worst == Some(Severity::Critical) {
        RiskLevel::Critical
    } else if score <= 70 || worst == Some(Severity::High) {
        RiskLevel::High
    } else if score <= 90 || violations > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
