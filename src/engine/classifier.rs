// src/engine/classifier.rs

//! Risk classifier.
//!
//! Maps a raw signal plus a summary of the session's history to an
//! authoritative severity, score delta and automatic action. The policy table
//! is plain data keyed by activity tag so new signal types can be added from a
//! JSON file without touching the state machine. Unknown tags fall through to
//! a no-op rule.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, ConfigError},
    models::{
        activity::{ActivityEvent, AutomaticAction, Severity},
        session::ProctorConfig,
    },
};

/// Raises severity/action once a tag has been seen `after_occurrences` times
/// (counting the current one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub after_occurrences: u32,
    pub severity: Severity,
    pub action: AutomaticAction,
}

/// Raises severity/action when the condition behind a derived signal has
/// persisted for at least `after_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainedEscalation {
    pub after_secs: u64,
    pub severity: Severity,
    pub action: AutomaticAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub severity: Severity,
    pub score_delta: i32,
    pub action: AutomaticAction,
    #[serde(default)]
    pub escalation: Option<Escalation>,
    #[serde(default)]
    pub sustained: Option<SustainedEscalation>,
}

impl PolicyRule {
    fn new(severity: Severity, score_delta: i32, action: AutomaticAction) -> Self {
        Self {
            severity,
            score_delta,
            action,
            escalation: None,
            sustained: None,
        }
    }

    fn escalate_after(mut self, occurrences: u32, severity: Severity, action: AutomaticAction) -> Self {
        self.escalation = Some(Escalation {
            after_occurrences: occurrences,
            severity,
            action,
        });
        self
    }

    fn escalate_when_sustained(mut self, secs: u64, severity: Severity, action: AutomaticAction) -> Self {
        self.sustained = Some(SustainedEscalation {
            after_secs: secs,
            severity,
            action,
        });
        self
    }

    /// Rule applied to tags the table does not know.
    pub fn fallback() -> Self {
        Self::new(Severity::Low, 0, AutomaticAction::None)
    }
}

/// Tag -> rule dictionary with a fallback for unknown tags.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    rules: HashMap<String, PolicyRule>,
    fallback: PolicyRule,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyTable {
    pub fn builtin() -> Self {
        use AutomaticAction::{Flag, Warning};
        use Severity::{Critical, High, Low, Medium};

        let rules = [
            (
                "tab_switch",
                PolicyRule::new(Medium, -5, Warning).escalate_after(3, Medium, Flag),
            ),
            (
                "window_blur",
                PolicyRule::new(Low, -2, Warning).escalate_after(3, Medium, Flag),
            ),
            (
                "copy_paste",
                PolicyRule::new(High, -15, Flag).escalate_after(3, Critical, Flag),
            ),
            ("right_click", PolicyRule::new(Low, -2, Warning)),
            (
                "no_face_detected",
                PolicyRule::new(Medium, -5, Warning).escalate_when_sustained(30, High, Flag),
            ),
            (
                "multiple_faces",
                PolicyRule::new(High, -20, Flag).escalate_after(3, Critical, Flag),
            ),
            ("fullscreen_exit", PolicyRule::new(High, -15, Flag)),
            ("devtools_open", PolicyRule::new(Critical, -30, Flag)),
            ("screen_share_stopped", PolicyRule::new(High, -10, Flag)),
            ("unauthorized_device", PolicyRule::new(Critical, -40, Flag)),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(tag, rule)| (tag.to_string(), rule))
                .collect(),
            fallback: PolicyRule::fallback(),
        }
    }

    /// Adds or replaces rules. Later entries win.
    pub fn with_overrides(mut self, overrides: HashMap<String, PolicyRule>) -> Self {
        self.rules.extend(overrides);
        self
    }

    /// Loads a JSON object of `tag -> rule` and merges it over `self`.
    pub fn with_overrides_from_file(self, path: &Path) -> Result<Self, ConfigError> {
        let policy_error = |reason: String| ConfigError::PolicyFile {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| policy_error(e.to_string()))?;
        let overrides: HashMap<String, PolicyRule> =
            serde_json::from_str(&raw).map_err(|e| policy_error(e.to_string()))?;
        Ok(self.with_overrides(overrides))
    }

    /// Built-in rules, then the policy file, then `NO_FACE_ESCALATE_SECS`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut table = Self::builtin();
        if let Some(path) = &config.policy_path {
            table = table.with_overrides_from_file(path)?;
        }
        if let Some(secs) = config.no_face_escalate_secs {
            table = table.with_no_face_escalation(secs);
        }
        Ok(table)
    }

    /// Sets the sustained-duration threshold of the `no_face_detected` rule.
    pub fn with_no_face_escalation(mut self, after_secs: u64) -> Self {
        if let Some(rule) = self.rules.get_mut("no_face_detected") {
            if let Some(sustained) = rule.sustained.as_mut() {
                sustained.after_secs = after_secs;
            }
        }
        self
    }

    pub fn rule_for(&self, activity_type: &str) -> &PolicyRule {
        self.rules.get(activity_type).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A signal to classify. Reported activities carry only a tag; derived
/// signals (no face in frame) also carry how long the condition has lasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub activity_type: String,
    pub sustained_secs: Option<u64>,
}

impl Signal {
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            sustained_secs: None,
        }
    }

    pub fn sustained(activity_type: impl Into<String>, secs: u64) -> Self {
        Self {
            activity_type: activity_type.into(),
            sustained_secs: Some(secs),
        }
    }
}

/// What the classifier needs to know about the events already recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    /// Prior events with the same tag.
    pub prior_of_type: u32,
    /// Prior events whose action was not `none`.
    pub violation_count: u32,
}

impl HistorySummary {
    pub fn from_events(events: &[ActivityEvent], activity_type: &str) -> Self {
        let mut summary = HistorySummary::default();
        for event in events {
            if event.activity_type == activity_type {
                summary.prior_of_type += 1;
            }
            if counts_as_violation(event.automatic_action) {
                summary.violation_count += 1;
            }
        }
        summary
    }
}

pub fn counts_as_violation(action: AutomaticAction) -> bool {
    action != AutomaticAction::None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    /// Always zero or negative.
    pub score_delta: i32,
    pub action: AutomaticAction,
}

impl Classification {
    pub fn should_terminate(&self) -> bool {
        self.action == AutomaticAction::Terminate
    }

    pub fn is_violation(&self) -> bool {
        counts_as_violation(self.action)
    }
}

/// Classifies `signal` against `table`.
///
/// Pure: the same table, config, history and signal always yield the same
/// classification.
pub fn classify(
    table: &PolicyTable,
    config: &ProctorConfig,
    history: &HistorySummary,
    signal: &Signal,
) -> Classification {
    let rule = table.rule_for(&signal.activity_type);

    let mut severity = rule.severity;
    let mut action = rule.action;

    let occurrence = history.prior_of_type.saturating_add(1);
    if let Some(escalation) = &rule.escalation {
        if occurrence >= escalation.after_occurrences {
            severity = severity.max(escalation.severity);
            action = action.max(escalation.action);
        }
    }

    if let (Some(sustained), Some(secs)) = (&rule.sustained, signal.sustained_secs) {
        if secs >= sustained.after_secs {
            severity = severity.max(sustained.severity);
            action = action.max(sustained.action);
        }
    }

    if counts_as_violation(action) {
        let violations = history.violation_count.saturating_add(1);
        let limit = config.max_suspicious_activities;
        if limit > 0 && violations >= limit {
            action = AutomaticAction::Terminate;
        }
    }

    if severity == Severity::Critical && config.auto_terminate_on_critical {
        action = AutomaticAction::Terminate;
    }

    Classification {
        severity,
        score_delta: rule.score_delta.min(0),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::EventSource;
    use chrono::Utc;

    fn no_face_threshold(table: &PolicyTable) -> Option<u64> {
        table
            .rule_for("no_face_detected")
            .sustained
            .as_ref()
            .map(|s| s.after_secs)
    }

    #[test]
    fn env_threshold_applies_over_policy_file() {
        let path = std::env::temp_dir().join(format!("proctor-policy-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{
                "no_face_detected": {
                    "severity": "medium",
                    "scoreDelta": -8,
                    "action": "warning",
                    "sustained": { "afterSecs": 90, "severity": "high", "action": "flag" }
                }
            }"#,
        )
        .unwrap();

        let mut config = Config {
            policy_path: Some(path.clone()),
            ..Config::default()
        };
        let from_file = PolicyTable::from_config(&config).unwrap();
        assert_eq!(no_face_threshold(&from_file), Some(90));
        assert_eq!(from_file.rule_for("no_face_detected").score_delta, -8);

        config.no_face_escalate_secs = Some(45);
        let with_env = PolicyTable::from_config(&config).unwrap();
        assert_eq!(no_face_threshold(&with_env), Some(45));
        assert_eq!(with_env.rule_for("no_face_detected").score_delta, -8);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn default_config_keeps_builtin_rules() {
        let table = PolicyTable::from_config(&Config::default()).unwrap();
        assert_eq!(table, PolicyTable::builtin());
        assert_eq!(no_face_threshold(&table), Some(30));
    }

    #[test]
    fn missing_policy_file_is_a_config_error() {
        let config = Config {
            policy_path: Some(std::env::temp_dir().join("proctor-policy-does-not-exist.json")),
            ..Config::default()
        };
        assert!(matches!(
            PolicyTable::from_config(&config),
            Err(ConfigError::PolicyFile { .. })
        ));
    }

    fn config(max: u32, auto_terminate: bool) -> ProctorConfig {
        ProctorConfig {
            max_suspicious_activities: max,
            auto_terminate_on_critical: auto_terminate,
            ..ProctorConfig::default()
        }
    }

    fn event(tag: &str, action: AutomaticAction) -> ActivityEvent {
        ActivityEvent {
            sequence: 1,
            activity_type: tag.to_string(),
            severity: Severity::Medium,
            details: String::new(),
            timestamp: Utc::now(),
            automatic_action: action,
            score_impact: -5,
            source: EventSource::Reported,
        }
    }

    #[test]
    fn first_tab_switch_is_a_medium_warning() {
        let table = PolicyTable::builtin();
        let c = classify(
            &table,
            &config(10, true),
            &HistorySummary::default(),
            &Signal::new("tab_switch"),
        );
        assert_eq!(c.severity, Severity::Medium);
        assert_eq!(c.score_delta, -5);
        assert_eq!(c.action, AutomaticAction::Warning);
    }

    #[test]
    fn third_tab_switch_escalates_to_flag() {
        let table = PolicyTable::builtin();
        let history = HistorySummary {
            prior_of_type: 2,
            violation_count: 2,
        };
        let c = classify(&table, &config(10, true), &history, &Signal::new("tab_switch"));
        assert_eq!(c.action, AutomaticAction::Flag);
        assert!(!c.should_terminate());
    }

    #[test]
    fn unknown_tag_is_a_no_op() {
        let table = PolicyTable::builtin();
        let c = classify(
            &table,
            &config(1, true),
            &HistorySummary::default(),
            &Signal::new("looked_at_ceiling"),
        );
        assert_eq!(c.severity, Severity::Low);
        assert_eq!(c.score_delta, 0);
        assert_eq!(c.action, AutomaticAction::None);
        assert!(!c.is_violation());
    }

    #[test]
    fn reaching_violation_limit_terminates() {
        let table = PolicyTable::builtin();
        let cfg = config(3, false);
        let mut events = Vec::new();
        let mut last = None;
        for _ in 0..3 {
            let history = HistorySummary::from_events(&events, "tab_switch");
            let c = classify(&table, &cfg, &history, &Signal::new("tab_switch"));
            events.push(event("tab_switch", c.action));
            last = Some(c);
        }
        assert!(last.unwrap().should_terminate());
    }

    #[test]
    fn zero_limit_disables_count_termination() {
        let table = PolicyTable::builtin();
        let history = HistorySummary {
            prior_of_type: 0,
            violation_count: 50,
        };
        let c = classify(&table, &config(0, false), &history, &Signal::new("fullscreen_exit"));
        assert_eq!(c.action, AutomaticAction::Flag);
    }

    #[test]
    fn critical_terminates_only_when_configured() {
        let table = PolicyTable::builtin();
        let signal = Signal::new("devtools_open");

        let on = classify(&table, &config(0, true), &HistorySummary::default(), &signal);
        assert_eq!(on.severity, Severity::Critical);
        assert!(on.should_terminate());

        let off = classify(&table, &config(0, false), &HistorySummary::default(), &signal);
        assert_eq!(off.severity, Severity::Critical);
        assert_eq!(off.action, AutomaticAction::Flag);
    }

    #[test]
    fn sustained_no_face_escalates_to_high() {
        let table = PolicyTable::builtin().with_no_face_escalation(20);
        let cfg = config(0, true);

        let brief = classify(
            &table,
            &cfg,
            &HistorySummary::default(),
            &Signal::sustained("no_face_detected", 6),
        );
        assert_eq!(brief.severity, Severity::Medium);
        assert_eq!(brief.action, AutomaticAction::Warning);

        let long = classify(
            &table,
            &cfg,
            &HistorySummary::default(),
            &Signal::sustained("no_face_detected", 21),
        );
        assert_eq!(long.severity, Severity::High);
        assert_eq!(long.action, AutomaticAction::Flag);
    }

    #[test]
    fn classification_is_deterministic() {
        let table = PolicyTable::builtin();
        let cfg = config(4, true);
        let history = HistorySummary {
            prior_of_type: 1,
            violation_count: 2,
        };
        let signal = Signal::new("multiple_faces");
        assert_eq!(
            classify(&table, &cfg, &history, &signal),
            classify(&table, &cfg, &history, &signal)
        );
    }

    #[test]
    fn overrides_replace_and_extend_rules() {
        let overrides: HashMap<String, PolicyRule> = serde_json::from_value(serde_json::json!({
            "phone_detected": { "severity": "high", "scoreDelta": -25, "action": "flag" },
            "right_click": { "severity": "medium", "scoreDelta": 7, "action": "warning" }
        }))
        .unwrap();
        let table = PolicyTable::builtin().with_overrides(overrides);

        let phone = classify(
            &table,
            &config(0, false),
            &HistorySummary::default(),
            &Signal::new("phone_detected"),
        );
        assert_eq!(phone.score_delta, -25);
        assert_eq!(phone.action, AutomaticAction::Flag);

        // Positive deltas from data never raise the score.
        let click = classify(
            &table,
            &config(0, false),
            &HistorySummary::default(),
            &Signal::new("right_click"),
        );
        assert_eq!(click.severity, Severity::Medium);
        assert_eq!(click.score_delta, 0);
    }

    #[test]
    fn history_counts_only_actionable_events() {
        let events = vec![
            event("tab_switch", AutomaticAction::Warning),
            event("mystery", AutomaticAction::None),
            event("tab_switch", AutomaticAction::Flag),
        ];
        let summary = HistorySummary::from_events(&events, "tab_switch");
        assert_eq!(summary.prior_of_type, 2);
        assert_eq!(summary.violation_count, 2);
    }
}
