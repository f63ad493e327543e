// src/engine/machine.rs

//! Session state machine.
//!
//! Every mutation of a `ProctoringSession` goes through the methods here.
//! They validate the transition first and only then touch the session, so a
//! returned error always leaves the record unchanged. Callers are expected to
//! hold the session's lock (see `services::proctoring`).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::{
        classifier::{self, HistorySummary, PolicyTable, Signal},
        risk::{self, INITIAL_SECURITY_SCORE},
    },
    error::ProctorError,
    models::{
        activity::{ActivityEvent, AutomaticAction, EventSource, Severity},
        recording::{RecordingChunkRequest, RecordingSummary, RecordingTrack},
        review::ProctorReview,
        session::{NoFaceStreak, ProctorConfig, ProctoringSession, RiskLevel, SessionStatus, SystemCheck},
        signal::{BiometricSample, FaceDetection, ScreenActivity, SignalDecision},
    },
};

/// Screen actions that raise an event when the student stays away long enough.
pub const AWAY_ACTIONS: [&str; 3] = ["tab_switch", "window_blur", "fullscreen_exit"];

/// Reasons that close a session as `terminated` rather than `ended`.
pub const FORCED_END_REASONS: [&str; 3] = ["violation_limit", "critical_violation", "proctor_terminated"];

/// Thresholds for turning raw samples into activity events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionThresholds {
    pub no_face_grace_secs: u64,
    pub screen_away_threshold_ms: u64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            no_face_grace_secs: 5,
            screen_away_threshold_ms: 2000,
        }
    }
}

/// Lists the capabilities `config` requires that `check` does not report.
pub fn missing_capabilities(config: &ProctorConfig, check: &SystemCheck) -> Vec<String> {
    let required = [
        (config.webcam_required, check.camera, "camera"),
        (config.audio_monitoring, check.microphone, "microphone"),
        (config.screen_recording, check.screen, "screen"),
        (config.browser_lockdown, check.browser, "browser"),
    ];
    required
        .into_iter()
        .filter(|(needed, present, _)| *needed && !*present)
        .map(|(_, _, name)| name.to_string())
        .collect()
}

/// Status a session closes with for a given `end` reason.
pub fn end_status_for(reason: &str) -> SessionStatus {
    if FORCED_END_REASONS.contains(&reason) {
        SessionStatus::Terminated
    } else {
        SessionStatus::Ended
    }
}

/// Score, violation count and risk level implied by an event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregates {
    pub security_score: u8,
    pub violation_count: u32,
    pub risk_level: RiskLevel,
}

impl Aggregates {
    pub fn from_events(events: &[ActivityEvent]) -> Self {
        let security_score = events.iter().fold(INITIAL_SECURITY_SCORE, |score, e| {
            risk::apply_score_delta(score, e.score_impact)
        });
        let violation_count = events
            .iter()
            .filter(|e| classifier::counts_as_violation(e.automatic_action))
            .count() as u32;
        Self {
            security_score,
            violation_count,
            risk_level: risk::derive_risk_level(security_score, events),
        }
    }
}

impl ProctoringSession {
    /// A fresh, `uninitialized` session.
    pub fn new(
        assignment_id: String,
        student_id: String,
        config: ProctorConfig,
        browser_info: serde_json::Value,
        device_info: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        let recordings = RecordingSummary {
            webcam_enabled: config.webcam_required,
            screen_enabled: config.screen_recording,
            audio_enabled: config.audio_monitoring,
            ..RecordingSummary::default()
        };
        Self {
            session_id: Uuid::new_v4(),
            assignment_id,
            student_id,
            config,
            browser_info,
            device_info,
            status: SessionStatus::Uninitialized,
            created_at: now,
            updated_at: now,
            start_time: None,
            end_time: None,
            end_reason: None,
            system_check: None,
            suspicious_activities: Vec::new(),
            biometric_samples: Vec::new(),
            screen_activity_log: Vec::new(),
            security_score: INITIAL_SECURITY_SCORE,
            risk_level: RiskLevel::Low,
            violation_count: 0,
            no_face_streak: NoFaceStreak::default(),
            recordings,
            proctor_review: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, SessionStatus::Initialized | SessionStatus::Active)
    }

    pub fn last_event(&self) -> Option<&ActivityEvent> {
        self.suspicious_activities.last()
    }

    fn ensure_status(&self, expected: SessionStatus, operation: &'static str) -> Result<(), ProctorError> {
        if self.status.is_terminal() {
            return Err(ProctorError::SessionClosed { status: self.status });
        }
        if self.status != expected {
            return Err(ProctorError::InvalidSessionState {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }

    /// `uninitialized -> initialized`.
    pub fn initialize(&mut self, now: DateTime<Utc>) -> Result<(), ProctorError> {
        self.ensure_status(SessionStatus::Uninitialized, "initialize")?;
        self.status = SessionStatus::Initialized;
        self.updated_at = now;
        Ok(())
    }

    /// Stores the latest capability probe. Allowed only before the exam starts.
    /// Returns the capabilities still missing.
    pub fn record_system_check(
        &mut self,
        check: SystemCheck,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ProctorError> {
        self.ensure_status(SessionStatus::Initialized, "record a system check")?;
        self.system_check = Some(check);
        self.updated_at = now;
        Ok(missing_capabilities(&self.config, &check))
    }

    /// `initialized -> active`, provided `check` covers the configured requirements.
    pub fn start(&mut self, check: SystemCheck, now: DateTime<Utc>) -> Result<(), ProctorError> {
        self.ensure_status(SessionStatus::Initialized, "start")?;
        let missing = missing_capabilities(&self.config, &check);
        if !missing.is_empty() {
            return Err(ProctorError::SystemRequirementsNotMet { missing });
        }
        self.system_check = Some(check);
        self.status = SessionStatus::Active;
        self.start_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `active -> ended | terminated`.
    pub fn end(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), ProctorError> {
        self.ensure_status(SessionStatus::Active, "end")?;
        self.close(end_status_for(reason), reason, now);
        Ok(())
    }

    fn close(&mut self, status: SessionStatus, reason: &str, now: DateTime<Utc>) {
        self.status = status;
        self.end_time = Some(now);
        self.end_reason = Some(reason.to_string());
        self.no_face_streak = NoFaceStreak::default();
        self.updated_at = now;
    }

    /// Attaches the faculty review. Only once, and only after the session closed.
    pub fn review(&mut self, review: ProctorReview) -> Result<(), ProctorError> {
        if !self.status.is_terminal() {
            return Err(ProctorError::InvalidSessionState {
                operation: "review",
                status: self.status,
            });
        }
        if self.proctor_review.is_some() {
            return Err(ProctorError::AlreadyReviewed(self.session_id));
        }
        self.updated_at = review.reviewed_at;
        self.proctor_review = Some(review);
        Ok(())
    }

    /// Reducer: appends `event` and recomputes every aggregate from the log.
    ///
    /// A `terminate` action closes the session at the event's timestamp.
    pub fn apply_event(&mut self, event: ActivityEvent) {
        let now = event.timestamp;
        let terminate = event.automatic_action == AutomaticAction::Terminate;
        let critical = event.severity == Severity::Critical;

        self.security_score = risk::apply_score_delta(self.security_score, event.score_impact);
        if classifier::counts_as_violation(event.automatic_action) {
            self.violation_count += 1;
        }
        self.suspicious_activities.push(event);
        self.risk_level = risk::derive_risk_level(self.security_score, &self.suspicious_activities);
        self.updated_at = now;
        debug_assert_eq!(
            Aggregates::from_events(&self.suspicious_activities),
            Aggregates {
                security_score: self.security_score,
                violation_count: self.violation_count,
                risk_level: self.risk_level,
            }
        );

        if terminate && !self.status.is_terminal() {
            let reason = if critical && self.config.auto_terminate_on_critical {
                "critical_violation"
            } else {
                "violation_limit"
            };
            self.close(SessionStatus::Terminated, reason, now);
        }
    }

    /// Classifies `signal` against the session's history and appends the
    /// resulting event. Requires an active session.
    pub fn record_activity(
        &mut self,
        table: &PolicyTable,
        signal: &Signal,
        details: String,
        source: EventSource,
        now: DateTime<Utc>,
    ) -> Result<SignalDecision, ProctorError> {
        self.ensure_status(SessionStatus::Active, "record activity")?;
        let event = self.classify_into_event(table, signal, details, source, now);
        self.apply_event(event.clone());
        Ok(self.decision(vec![event]))
    }

    fn classify_into_event(
        &self,
        table: &PolicyTable,
        signal: &Signal,
        details: String,
        source: EventSource,
        now: DateTime<Utc>,
    ) -> ActivityEvent {
        let history = HistorySummary::from_events(&self.suspicious_activities, &signal.activity_type);
        let classification = classifier::classify(table, &self.config, &history, signal);
        ActivityEvent {
            sequence: self.suspicious_activities.len() as u64 + 1,
            activity_type: signal.activity_type.clone(),
            severity: classification.severity,
            details,
            timestamp: now,
            automatic_action: classification.action,
            score_impact: classification.score_delta,
            source,
        }
    }

    /// Appends derived signals in order, stopping once the session closes.
    fn record_derived(
        &mut self,
        table: &PolicyTable,
        derived: Vec<(Signal, String)>,
        source: EventSource,
        now: DateTime<Utc>,
    ) -> SignalDecision {
        let mut appended = Vec::new();
        for (signal, details) in derived {
            if self.status != SessionStatus::Active {
                break;
            }
            let event = self.classify_into_event(table, &signal, details, source, now);
            self.apply_event(event.clone());
            appended.push(event);
        }
        self.decision(appended)
    }

    /// Stores a biometric sample and raises `no_face_detected` /
    /// `multiple_faces` events when the sample crosses a threshold.
    pub fn record_biometric(
        &mut self,
        table: &PolicyTable,
        thresholds: &DetectionThresholds,
        face_detection: FaceDetection,
        eye_tracking: Option<serde_json::Value>,
        environment_audio: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<SignalDecision, ProctorError> {
        self.ensure_status(SessionStatus::Active, "record biometric data")?;

        self.biometric_samples.push(BiometricSample {
            face_detection,
            eye_tracking,
            environment_audio,
            received_at: now,
        });
        self.updated_at = now;

        let mut derived = Vec::new();
        if self.config.face_detection {
            if face_detection.face_count == 0 {
                if let Some(signal) = self.extend_no_face_streak(table, thresholds, now) {
                    let secs = signal.sustained_secs.unwrap_or(0);
                    derived.push((signal, format!("No face detected for {}s", secs)));
                }
            } else {
                self.no_face_streak = NoFaceStreak::default();
            }
            if face_detection.face_count > 1 {
                derived.push((
                    Signal::new("multiple_faces"),
                    format!("{} faces detected", face_detection.face_count),
                ));
            }
        }

        Ok(self.record_derived(table, derived, EventSource::Biometric, now))
    }

    fn extend_no_face_streak(
        &mut self,
        table: &PolicyTable,
        thresholds: &DetectionThresholds,
        now: DateTime<Utc>,
    ) -> Option<Signal> {
        let since = *self.no_face_streak.since.get_or_insert(now);
        let elapsed = (now - since).num_seconds().max(0) as u64;
        let escalate_after = table
            .rule_for("no_face_detected")
            .sustained
            .as_ref()
            .map(|s| s.after_secs);
        let past_escalation = escalate_after.is_some_and(|after| elapsed >= after);

        let streak = &mut self.no_face_streak;
        if !streak.raised {
            if elapsed < thresholds.no_face_grace_secs {
                return None;
            }
            streak.raised = true;
            streak.escalated = past_escalation;
            return Some(Signal::sustained("no_face_detected", elapsed));
        }
        if !streak.escalated && past_escalation {
            streak.escalated = true;
            return Some(Signal::sustained("no_face_detected", elapsed));
        }
        None
    }

    /// Stores a screen/focus record and raises an event when the student was
    /// away for at least the configured threshold.
    pub fn record_screen_activity(
        &mut self,
        table: &PolicyTable,
        thresholds: &DetectionThresholds,
        action: String,
        details: String,
        duration: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<SignalDecision, ProctorError> {
        self.ensure_status(SessionStatus::Active, "record screen activity")?;

        let crossed = AWAY_ACTIONS.contains(&action.as_str())
            && duration.unwrap_or(0) >= thresholds.screen_away_threshold_ms;
        let derived = if crossed {
            vec![(Signal::new(action.clone()), details.clone())]
        } else {
            Vec::new()
        };

        self.screen_activity_log.push(ScreenActivity {
            action,
            details,
            duration,
            received_at: now,
        });
        self.updated_at = now;

        Ok(self.record_derived(table, derived, EventSource::ScreenActivity, now))
    }

    /// Registers metadata for one uploaded media chunk.
    ///
    /// Chunks are accepted while active, and after close only if they were
    /// captured before the session ended.
    pub fn register_chunk(
        &mut self,
        chunk: &RecordingChunkRequest,
        now: DateTime<Utc>,
    ) -> Result<RecordingTrack, ProctorError> {
        match self.status {
            SessionStatus::Active => {}
            SessionStatus::Ended | SessionStatus::Terminated => {
                let captured_in_session = self.end_time.is_some_and(|end| chunk.started_at <= end);
                if !captured_in_session {
                    return Err(ProctorError::SessionClosed { status: self.status });
                }
            }
            status => {
                return Err(ProctorError::InvalidSessionState {
                    operation: "upload recordings",
                    status,
                });
            }
        }

        if !self.recordings.is_enabled(chunk.recording_type) {
            return Err(ProctorError::Validation(format!(
                "{:?} recording is not enabled for this session",
                chunk.recording_type
            )));
        }

        let track = self.recordings.tracks.entry(chunk.recording_type).or_default();
        if track.last_sequence.is_some_and(|last| chunk.sequence <= last) {
            return Err(ProctorError::Validation(format!(
                "chunk sequence {} is not after {}",
                chunk.sequence,
                track.last_sequence.unwrap_or_default()
            )));
        }
        let Some(total_bytes) = track.total_bytes.checked_add(chunk.byte_size) else {
            return Err(ProctorError::Validation(format!(
                "{:?} track byte total would overflow",
                chunk.recording_type
            )));
        };
        track.chunk_count += 1;
        track.total_bytes = total_bytes;
        track.last_sequence = Some(chunk.sequence);
        let track = *track;

        self.updated_at = now;
        Ok(track)
    }

    fn decision(&self, events: Vec<ActivityEvent>) -> SignalDecision {
        let action = events
            .iter()
            .map(|e| e.automatic_action)
            .max()
            .unwrap_or(AutomaticAction::None);
        SignalDecision {
            action,
            should_terminate: action == AutomaticAction::Terminate,
            events,
            security_score: self.security_score,
            risk_level: self.risk_level,
            status: self.status,
        }
    }
}
