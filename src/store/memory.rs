// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionFilter, SessionStore};
use crate::{error::ProctorError, models::session::ProctoringSession};

/// In-memory store used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, ProctoringSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &ProctoringSession) -> Result<(), ProctorError> {
        let mut sessions = self.sessions.write().await;

        let duplicate = sessions.values().any(|s| {
            s.is_open()
                && s.assignment_id == session.assignment_id
                && s.student_id == session.student_id
        });
        if duplicate {
            return Err(ProctorError::DuplicateSession {
                assignment_id: session.assignment_id.clone(),
                student_id: session.student_id.clone(),
            });
        }

        sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn save(
        &self,
        session: &ProctoringSession,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), ProctorError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.session_id) {
            Some(existing) if existing.updated_at != expected_updated_at => {
                Err(ProctorError::ConcurrentUpdate(session.session_id))
            }
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(ProctorError::SessionNotFound(session.session_id)),
        }
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<ProctoringSession>, ProctorError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn find_open(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<ProctoringSession>, ProctorError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|s| s.is_open() && s.assignment_id == assignment_id && s.student_id == student_id)
            .cloned())
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<ProctoringSession>, ProctorError> {
        let sessions = self.sessions.read().await;
        let mut matched: Vec<ProctoringSession> = sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(matched)
    }
}
