//! Submission repository implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use formflow_core::error::{AppError, ErrorKind};
use formflow_core::result::AppResult;
use formflow_entity::signature::SignatureStatus;
use formflow_entity::submission::Submission;

/// Repository for `form_submissions` and the `signature_documents` lookup table.
#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    /// Create a new submission repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a submission by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Submission>> {
        sqlx::query_as::<_, Submission>("SELECT * FROM form_submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find submission", e))
    }

    /// Most recent provider document recorded for a submission.
    pub async fn find_document_id(&self, submission_id: i64) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT document_id FROM signature_documents \
             WHERE submission_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find signature document", e)
        })
    }

    /// Store a new aggregated signature status.
    pub async fn update_signature_status(
        &self,
        id: i64,
        status: SignatureStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE form_submissions SET signature_status = $2, \
             signature_completed_at = COALESCE($3, signature_completed_at), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update signature status", e)
        })?;
        Ok(())
    }
}
