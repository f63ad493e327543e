// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::{SessionFilter, SessionStore};
use crate::{error::ProctorError, models::session::ProctoringSession};

/// Postgres-backed store. One row per session in `proctoring_sessions`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps the partial unique index violation to `DuplicateSession`.
fn map_insert_error(err: sqlx::Error, session: &ProctoringSession) -> ProctorError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return ProctorError::DuplicateSession {
                assignment_id: session.assignment_id.clone(),
                student_id: session.student_id.clone(),
            };
        }
    }
    tracing::error!("Failed to insert proctoring session: {:?}", err);
    ProctorError::from(err)
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, session: &ProctoringSession) -> Result<(), ProctorError> {
        sqlx::query(
            r#"
            INSERT INTO proctoring_sessions
                (id, assignment_id, student_id, status, risk_level, security_score,
                 violation_count, start_time, end_time, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(session.session_id)
        .bind(&session.assignment_id)
        .bind(&session.student_id)
        .bind(session.status.as_str())
        .bind(session.risk_level.as_str())
        .bind(i16::from(session.security_score))
        .bind(session.violation_count as i32)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(Json(session))
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, session))?;

        Ok(())
    }

    async fn save(
        &self,
        session: &ProctoringSession,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), ProctorError> {
        let result = sqlx::query(
            r#"
            UPDATE proctoring_sessions SET
                status = $2,
                risk_level = $3,
                security_score = $4,
                violation_count = $5,
                start_time = $6,
                end_time = $7,
                record = $8,
                updated_at = $9
            WHERE id = $1 AND updated_at = $10
            "#,
        )
        .bind(session.session_id)
        .bind(session.status.as_str())
        .bind(session.risk_level.as_str())
        .bind(i16::from(session.security_score))
        .bind(session.violation_count as i32)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(Json(session))
        .bind(session.updated_at)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save proctoring session: {:?}", e);
            ProctorError::from(e)
        })?;

        if result.rows_affected() == 0 {
            // Either the row is gone or another instance saved it since we loaded.
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM proctoring_sessions WHERE id = $1)")
                    .bind(session.session_id)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(if exists {
                tracing::warn!(session_id = %session.session_id, "Rejected stale session write");
                ProctorError::ConcurrentUpdate(session.session_id)
            } else {
                ProctorError::SessionNotFound(session.session_id)
            });
        }
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<ProctoringSession>, ProctorError> {
        let record: Option<Json<ProctoringSession>> =
            sqlx::query_scalar("SELECT record FROM proctoring_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record.map(|Json(session)| session))
    }

    async fn find_open(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<ProctoringSession>, ProctorError> {
        let record: Option<Json<ProctoringSession>> = sqlx::query_scalar(
            r#"
            SELECT record FROM proctoring_sessions
            WHERE assignment_id = $1 AND student_id = $2
              AND status IN ('initialized', 'active')
            "#,
        )
        .bind(assignment_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|Json(session)| session))
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<ProctoringSession>, ProctorError> {
        // Use QueryBuilder for the optional filters
        let mut query_builder =
            QueryBuilder::<Postgres>::new("SELECT record FROM proctoring_sessions WHERE TRUE");

        if let Some(assignment_id) = &filter.assignment_id {
            query_builder
                .push(" AND assignment_id = ")
                .push_bind(assignment_id.clone());
        }
        if let Some(status) = filter.status {
            query_builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(risk_level) = filter.risk_level {
            query_builder
                .push(" AND risk_level = ")
                .push_bind(risk_level.as_str());
        }
        if let Some(created_after) = filter.created_after {
            query_builder
                .push(" AND created_at >= ")
                .push_bind(created_after);
        }
        query_builder.push(" ORDER BY created_at DESC, id ASC");

        let records: Vec<Json<ProctoringSession>> = query_builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list proctoring sessions: {:?}", e);
                ProctorError::from(e)
            })?;

        Ok(records.into_iter().map(|Json(session)| session).collect())
    }
}
