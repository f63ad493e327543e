// src/store/mod.rs

//! Session persistence.
//!
//! Stores are deliberately dumb: they load and save whole session records.
//! Serialization of concurrent writers is the service's job.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::ProctorError,
    models::session::{ProctoringSession, RiskLevel, SessionStatus},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub assignment_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub risk_level: Option<RiskLevel>,
    pub created_after: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn matches(&self, session: &ProctoringSession) -> bool {
        self.assignment_id
            .as_deref()
            .is_none_or(|a| a == session.assignment_id)
            && self.status.is_none_or(|s| s == session.status)
            && self.risk_level.is_none_or(|r| r == session.risk_level)
            && self.created_after.is_none_or(|t| session.created_at >= t)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session. Fails with `DuplicateSession` if another open
    /// session exists for the same assignment and student.
    async fn insert(&self, session: &ProctoringSession) -> Result<(), ProctorError>;

    /// Overwrites an existing session record, provided the stored copy still
    /// carries `expected_updated_at`. Otherwise another writer got there first
    /// and the call fails with `ConcurrentUpdate`.
    async fn save(
        &self,
        session: &ProctoringSession,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), ProctorError>;

    async fn load(&self, session_id: Uuid) -> Result<Option<ProctoringSession>, ProctorError>;

    /// The `initialized` or `active` session for this attempt, if any.
    async fn find_open(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<ProctoringSession>, ProctorError>;

    /// Sessions matching `filter`, newest first.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<ProctoringSession>, ProctorError>;
}
