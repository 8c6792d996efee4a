//! Job repository implementation.
//!
//! Every state transition is a single conditional `UPDATE ... WHERE status = ?`
//! so that concurrent drains can never both win the same row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use formflow_core::error::{AppError, ErrorKind};
use formflow_core::result::AppResult;
use formflow_entity::job::model::{CreateJob, Job};
use formflow_entity::job::status::JobStatus;

/// Repository for the `form_jobs` table.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending job and return its ID.
    pub async fn insert(&self, data: &CreateJob) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO form_jobs (job_type, payload, priority, status, attempts, max_attempts, created_at, scheduled_at) \
             VALUES ($1, $2, $3, 'pending', 0, $4, $5, $6) RETURNING id",
        )
        .bind(&data.job_type)
        .bind(&data.payload)
        .bind(data.priority)
        .bind(data.max_attempts)
        .bind(data.created_at)
        .bind(data.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert job", e))
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM form_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// Select up to `limit` due pending jobs, high priority first, then oldest schedule.
    pub async fn select_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM form_jobs \
             WHERE status = 'pending' AND scheduled_at <= $1 \
             ORDER BY \
                CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 WHEN 'low' THEN 2 END, \
                scheduled_at ASC, \
                id ASC \
             LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to select due jobs", e))
    }

    /// Claim a pending job. Returns `None` when another worker got there first.
    pub async fn claim(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE form_jobs SET status = 'processing', attempts = attempts + 1, started_at = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim job", e))
    }

    /// Mark a processing job as completed.
    pub async fn complete(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE form_jobs SET status = 'completed', completed_at = $2 \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Put a processing job back to pending for a later retry.
    pub async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE form_jobs SET status = 'pending', scheduled_at = $2, last_error = $3 \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(scheduled_at)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reschedule job", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Move a job from `from` to `dead_letter`.
    pub async fn dead_letter(&self, id: i64, from: JobStatus, error: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE form_jobs SET status = 'dead_letter', last_error = $3 \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to dead-letter job", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Count jobs per status. Statuses without rows are absent from the result.
    pub async fn count_by_status(&self) -> AppResult<Vec<(JobStatus, i64)>> {
        sqlx::query_as::<_, (JobStatus, i64)>(
            "SELECT status, COUNT(*) FROM form_jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }

    /// Delete completed and dead-lettered jobs last active before `before`.
    pub async fn purge_terminal(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM form_jobs \
             WHERE status IN ('completed', 'dead_letter') \
             AND COALESCE(completed_at, started_at, created_at) < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge jobs", e))?;
        Ok(result.rows_affected())
    }

    /// Return orphaned processing jobs and stale failed jobs to pending.
    ///
    /// `attempts` is left untouched.
    pub async fn recover_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE form_jobs SET status = 'pending', started_at = NULL \
             WHERE (status = 'processing' AND started_at < $1) \
             OR (status = 'failed' AND COALESCE(started_at, created_at) < $1)",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to recover stale jobs", e)
        })?;
        Ok(result.rows_affected())
    }

    /// List jobs in a status, most recently scheduled first.
    pub async fn list_by_status(&self, status: JobStatus, limit: i64) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM form_jobs WHERE status = $1 ORDER BY scheduled_at DESC, id DESC LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    /// Give a dead-lettered job a fresh attempt budget.
    pub async fn requeue_dead_letter(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE form_jobs SET status = 'pending', attempts = 0, scheduled_at = GREATEST($2, created_at), \
             started_at = NULL, completed_at = NULL \
             WHERE id = $1 AND status = 'dead_letter'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to requeue job", e))?;
        Ok(result.rows_affected() == 1)
    }
}
