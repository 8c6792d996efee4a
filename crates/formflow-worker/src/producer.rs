//! Enqueue side of the queue, shared by the manager and by handlers that
//! schedule follow-up work.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing;

use formflow_core::error::{AppError, ErrorKind};
use formflow_core::result::AppResult;
use formflow_entity::job::{CreateJob, JobPriority};

use crate::executor::JobPayload;
use crate::store::JobStore;

/// Width of the `form_jobs.job_type` column.
pub const MAX_JOB_TYPE_LEN: usize = 100;

/// Parameters for creating a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueParams {
    /// Type of job (e.g., "pdf_render", "signature_status_check")
    pub job_type: String,
    /// Job payload as JSON
    pub payload: Value,
    /// Priority level
    #[serde(default)]
    pub priority: JobPriority,
    /// Delay before the job becomes due
    #[serde(default)]
    pub delay: Duration,
}

impl EnqueueParams {
    /// Medium priority, no delay.
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            priority: JobPriority::default(),
            delay: Duration::ZERO,
        }
    }

    /// Build params from a typed payload.
    pub fn from_payload<P: JobPayload>(payload: &P) -> AppResult<Self> {
        Ok(Self::new(P::JOB_TYPE, serde_json::to_value(payload)?))
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Cheap, cloneable handle that inserts jobs into the store.
#[derive(Debug, Clone)]
pub struct JobProducer {
    store: Arc<dyn JobStore>,
    max_attempts: i32,
}

impl JobProducer {
    /// Create a producer snapshotting `max_attempts` onto every new job.
    pub fn new(store: Arc<dyn JobStore>, max_attempts: i32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Insert a pending job and return its ID.
    pub async fn enqueue(&self, params: EnqueueParams) -> AppResult<i64> {
        let job_type = params.job_type.trim();
        if job_type.is_empty() {
            return Err(AppError::validation("Job type must not be empty"));
        }
        if job_type.chars().count() > MAX_JOB_TYPE_LEN {
            return Err(AppError::validation(format!(
                "Job type must be at most {} characters",
                MAX_JOB_TYPE_LEN
            )));
        }

        let delay = chrono::Duration::from_std(params.delay)
            .map_err(|e| AppError::with_source(ErrorKind::Validation, "Job delay out of range", e))?;
        let now = Utc::now();
        let scheduled_at = now
            .checked_add_signed(delay)
            .ok_or_else(|| AppError::validation("Job delay out of range"))?;
        let job = CreateJob {
            job_type: job_type.to_string(),
            priority: params.priority,
            payload: params.payload,
            max_attempts: self.max_attempts,
            created_at: now,
            scheduled_at,
        };

        let id = self.store.insert(&job).await?;

        tracing::debug!(
            job_id = id,
            job_type = %job.job_type,
            priority = %job.priority,
            scheduled_at = %job.scheduled_at,
            "Enqueued job"
        );

        Ok(id)
    }

    /// Serialize a typed payload and enqueue it under its own job type.
    pub async fn enqueue_payload<P: JobPayload>(
        &self,
        payload: &P,
        priority: JobPriority,
        delay: Duration,
    ) -> AppResult<i64> {
        let params = EnqueueParams::from_payload(payload)?
            .with_priority(priority)
            .with_delay(delay);
        self.enqueue(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use formflow_entity::job::JobStatus;

    #[tokio::test]
    async fn test_enqueue_snapshots_attempts_and_delay() {
        let store = MemoryJobStore::new();
        let producer = JobProducer::new(Arc::new(store.clone()), 5);

        let id = producer
            .enqueue(
                EnqueueParams::new("email_send", serde_json::json!({"to": "a@example.com"}))
                    .with_priority(JobPriority::High)
                    .with_delay(Duration::from_secs(120)),
            )
            .await
            .unwrap();

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, JobPriority::High);
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.attempts, 0);
        assert_eq!((job.scheduled_at - job.created_at).num_seconds(), 120);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_job_type() {
        let store = MemoryJobStore::new();
        let producer = JobProducer::new(Arc::new(store.clone()), 3);

        let err = producer
            .enqueue(EnqueueParams::new("   ", serde_json::json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_delay_past_calendar_range() {
        let store = MemoryJobStore::new();
        let producer = JobProducer::new(Arc::new(store.clone()), 3);

        let err = producer
            .enqueue(
                EnqueueParams::new("email_send", serde_json::json!({}))
                    .with_delay(Duration::from_secs(10_000_000_000_000)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_enforces_job_type_column_width() {
        let store = MemoryJobStore::new();
        let producer = JobProducer::new(Arc::new(store.clone()), 3);

        let err = producer
            .enqueue(EnqueueParams::new("x".repeat(101), serde_json::json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.is_empty());

        producer
            .enqueue(EnqueueParams::new("x".repeat(100), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        let producer = JobProducer::new(Arc::new(MemoryJobStore::new()), 0);
        assert_eq!(producer.max_attempts, 1);
    }
}
