// src/services/proctoring.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::{
    engine::{DetectionThresholds, PolicyTable, Signal},
    error::ProctorError,
    models::{
        activity::{AutomaticAction, EventSource, SuspiciousActivityRequest},
        analytics::SessionUpdate,
        recording::{RecordingChunkRequest, RecordingChunkResponse},
        review::{ProctorReview, SubmitReviewRequest},
        session::{InitializeSessionRequest, ProctoringSession, SystemCheck, SystemCheckResponse},
        signal::{BiometricSampleRequest, ScreenActivityRequest, SignalDecision},
    },
    store::SessionStore,
    utils::html::clean_text,
};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Owns every write to proctoring sessions.
///
/// Mutations of one session are serialized through a per-session mutex held
/// across load, reduce and save, so the event log is totally ordered by
/// arrival and the score cannot lose updates. Different sessions proceed in
/// parallel.
pub struct ProctoringService {
    store: Arc<dyn SessionStore>,
    policy: Arc<PolicyTable>,
    thresholds: DetectionThresholds,
    session_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    init_lock: Mutex<()>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl ProctoringService {
    pub fn new(store: Arc<dyn SessionStore>, policy: PolicyTable, thresholds: DetectionThresholds) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            policy: Arc::new(policy),
            thresholds,
            session_locks: Mutex::new(HashMap::new()),
            init_lock: Mutex::new(()),
            updates,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Live feed of session changes, one message per committed mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Lock for an existing session. Unknown ids get `SessionNotFound` and
    /// never allocate an entry; sessions are never deleted, so an entry always
    /// belongs to a stored record.
    async fn session_lock(&self, session_id: Uuid) -> Result<Arc<Mutex<()>>, ProctorError> {
        if let Some(lock) = self.session_locks.lock().await.get(&session_id) {
            return Ok(Arc::clone(lock));
        }

        if self.store.load(session_id).await?.is_none() {
            return Err(ProctorError::SessionNotFound(session_id));
        }

        let mut locks = self.session_locks.lock().await;
        Ok(locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Runs `f` against the current record under the session's lock and
    /// persists the result. Nothing is saved if `f` fails.
    async fn mutate<T, F>(&self, session_id: Uuid, f: F) -> Result<(T, ProctoringSession), ProctorError>
    where
        F: FnOnce(&mut ProctoringSession, DateTime<Utc>) -> Result<T, ProctorError>,
    {
        let lock = self.session_lock(session_id).await?;
        let _guard = lock.lock().await;

        let mut session = self
            .store
            .load(session_id)
            .await?
            .ok_or(ProctorError::SessionNotFound(session_id))?;
        let loaded_at = session.updated_at;

        let now = Utc::now();
        let output = f(&mut session, now)?;
        session.updated_at = now;

        self.store.save(&session, loaded_at).await?;
        self.publish(&session);

        Ok((output, session))
    }

    fn publish(&self, session: &ProctoringSession) {
        // No subscribers is fine.
        let _ = self.updates.send(SessionUpdate {
            session_id: session.session_id,
            assignment_id: session.assignment_id.clone(),
            student_id: session.student_id.clone(),
            status: session.status,
            security_score: session.security_score,
            risk_level: session.risk_level,
            violation_count: session.violation_count,
            last_event: session.last_event().cloned(),
        });
    }

    fn log_decision(session: &ProctoringSession, decision: &SignalDecision) {
        for event in &decision.events {
            tracing::debug!(
                session_id = %session.session_id,
                sequence = event.sequence,
                activity_type = %event.activity_type,
                severity = %event.severity,
                action = %event.automatic_action,
                "Activity event recorded"
            );
        }
        match decision.action {
            AutomaticAction::Terminate => tracing::warn!(
                session_id = %session.session_id,
                student_id = %session.student_id,
                security_score = session.security_score,
                reason = session.end_reason.as_deref().unwrap_or_default(),
                "Proctoring session terminated automatically"
            ),
            AutomaticAction::Flag => tracing::warn!(
                session_id = %session.session_id,
                security_score = session.security_score,
                risk_level = %session.risk_level,
                "Proctoring session flagged"
            ),
            _ => {}
        }
    }

    /// Creates a session in `initialized` state for this attempt.
    pub async fn initialize(&self, req: InitializeSessionRequest) -> Result<ProctoringSession, ProctorError> {
        // Duplicate check and insert must be atomic.
        let _guard = self.init_lock.lock().await;

        if self
            .store
            .find_open(&req.assignment_id, &req.student_id)
            .await?
            .is_some()
        {
            return Err(ProctorError::DuplicateSession {
                assignment_id: req.assignment_id,
                student_id: req.student_id,
            });
        }

        let now = Utc::now();
        let mut session = ProctoringSession::new(
            req.assignment_id,
            req.student_id,
            req.proctor_config,
            req.browser_info,
            req.device_info,
            now,
        );
        session.initialize(now)?;
        self.store.insert(&session).await?;
        self.publish(&session);

        tracing::info!(
            session_id = %session.session_id,
            assignment_id = %session.assignment_id,
            student_id = %session.student_id,
            "Proctoring session initialized"
        );
        Ok(session)
    }

    pub async fn start(&self, session_id: Uuid, check: SystemCheck) -> Result<ProctoringSession, ProctorError> {
        let (_, session) = self
            .mutate(session_id, |session, now| session.start(check, now))
            .await
            .inspect_err(|e| {
                tracing::info!(session_id = %session_id, error = %e, "Proctoring session start rejected");
            })?;

        tracing::info!(session_id = %session_id, "Proctoring session started");
        Ok(session)
    }

    pub async fn system_check(
        &self,
        session_id: Uuid,
        check: SystemCheck,
    ) -> Result<SystemCheckResponse, ProctorError> {
        let (missing, _) = self
            .mutate(session_id, |session, now| session.record_system_check(check, now))
            .await?;

        Ok(SystemCheckResponse {
            requirements_met: missing.is_empty(),
            missing,
        })
    }

    /// Reports a client-detected suspicious activity.
    ///
    /// Severity is always re-derived by the classifier; the client's hint is
    /// only logged.
    pub async fn report_suspicious_activity(
        &self,
        session_id: Uuid,
        req: SuspiciousActivityRequest,
    ) -> Result<SignalDecision, ProctorError> {
        let signal = Signal::new(req.activity_type);
        let details = clean_text(&req.details);
        let policy = Arc::clone(&self.policy);

        let (decision, session) = self
            .mutate(session_id, |session, now| {
                session.record_activity(&policy, &signal, details, EventSource::Reported, now)
            })
            .await?;

        if let (Some(hint), Some(event)) = (req.severity, decision.events.first()) {
            if hint != event.severity {
                tracing::info!(
                    session_id = %session_id,
                    activity_type = %event.activity_type,
                    client_severity = %hint,
                    classified_severity = %event.severity,
                    "Ignoring client severity hint"
                );
            }
        }

        Self::log_decision(&session, &decision);
        Ok(decision)
    }

    pub async fn record_biometric(
        &self,
        session_id: Uuid,
        req: BiometricSampleRequest,
    ) -> Result<SignalDecision, ProctorError> {
        let policy = Arc::clone(&self.policy);
        let thresholds = self.thresholds;

        let (decision, session) = self
            .mutate(session_id, |session, now| {
                session.record_biometric(
                    &policy,
                    &thresholds,
                    req.face_detection,
                    req.eye_tracking,
                    req.environment_audio,
                    now,
                )
            })
            .await?;

        Self::log_decision(&session, &decision);
        Ok(decision)
    }

    pub async fn record_screen_activity(
        &self,
        session_id: Uuid,
        req: ScreenActivityRequest,
    ) -> Result<SignalDecision, ProctorError> {
        let policy = Arc::clone(&self.policy);
        let thresholds = self.thresholds;
        let details = clean_text(&req.details);

        let (decision, session) = self
            .mutate(session_id, |session, now| {
                session.record_screen_activity(&policy, &thresholds, req.action, details, req.duration, now)
            })
            .await?;

        Self::log_decision(&session, &decision);
        Ok(decision)
    }

    /// Ends an active session. Called by the client on submit and by the
    /// external assignment timer with `time_expired`.
    pub async fn end(&self, session_id: Uuid, reason: &str) -> Result<ProctoringSession, ProctorError> {
        let (_, session) = self
            .mutate(session_id, |session, now| session.end(reason, now))
            .await?;

        tracing::info!(
            session_id = %session_id,
            status = %session.status,
            reason = %reason,
            security_score = session.security_score,
            "Proctoring session ended"
        );
        Ok(session)
    }

    pub async fn review(
        &self,
        session_id: Uuid,
        req: SubmitReviewRequest,
    ) -> Result<ProctoringSession, ProctorError> {
        let notes = clean_text(&req.notes);

        let (_, session) = self
            .mutate(session_id, |session, now| {
                session.review(ProctorReview {
                    reviewer_id: req.reviewer_id,
                    decision: req.decision,
                    notes,
                    overall_rating: req.overall_rating,
                    reviewed_at: now,
                })
            })
            .await?;

        tracing::info!(
            session_id = %session_id,
            decision = ?req.decision,
            "Proctoring review submitted"
        );
        Ok(session)
    }

    /// Registers one uploaded media chunk. Only metadata passes through here.
    pub async fn register_chunk(
        &self,
        session_id: Uuid,
        req: RecordingChunkRequest,
    ) -> Result<RecordingChunkResponse, ProctorError> {
        let (track, _) = self
            .mutate(session_id, |session, now| session.register_chunk(&req, now))
            .await?;

        Ok(RecordingChunkResponse {
            recording_type: req.recording_type,
            sequence: req.sequence,
            track,
        })
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<ProctoringSession, ProctorError> {
        self.store
            .load(session_id)
            .await?
            .ok_or(ProctorError::SessionNotFound(session_id))
    }
}
