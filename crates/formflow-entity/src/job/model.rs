//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{JobPriority, JobStatus};

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: i64,
    /// Job type identifier used to pick a handler (e.g. `"signature_status_check"`).
    pub job_type: String,
    /// Handler-defined payload (JSON). Never modified after enqueue.
    pub payload: serde_json::Value,
    /// Job priority.
    pub priority: JobPriority,
    /// Current job status.
    pub status: JobStatus,
    /// Number of claims so far.
    pub attempts: i32,
    /// Attempts allowed, snapshotted at enqueue.
    pub max_attempts: i32,
    /// Most recent handler error, truncated to the column budget.
    pub last_error: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Earliest time the job may be claimed.
    pub scheduled_at: DateTime<Utc>,
    /// When the current (or last) claim happened.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed successfully.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Check whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check whether the job may be claimed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }

    /// Last time anything happened to the job, used for retention.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.completed_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Job type identifier.
    pub job_type: String,
    /// Priority.
    pub priority: JobPriority,
    /// Job-specific payload.
    pub payload: serde_json::Value,
    /// Maximum attempts.
    pub max_attempts: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Earliest execution time (`created_at + delay`).
    pub scheduled_at: DateTime<Utc>,
}
