//! In-memory job store using dashmap.
//!
//! Conditional transitions run while holding the entry's shard lock, which
//! gives the same single-winner guarantee as a conditional `UPDATE`.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use formflow_core::result::AppResult;
use formflow_entity::job::{CreateJob, Job, JobStatus};

use super::JobStore;

/// Job store kept in process memory. Used by tests and single-process embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<i64, Job>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the store holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshot of every stored job, ordered by ID.
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Apply `change` to the job only if it currently has status `from`.
    fn transition(&self, id: i64, from: JobStatus, change: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut entry = self.jobs.get_mut(&id)?;
        if entry.status != from {
            return None;
        }
        change(entry.value_mut());
        Some(entry.value().clone())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &CreateJob) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs.insert(
            id,
            Job {
                id,
                job_type: job.job_type.clone(),
                payload: job.payload.clone(),
                priority: job.priority,
                status: JobStatus::Pending,
                attempts: 0,
                max_attempts: job.max_attempts,
                last_error: None,
                created_at: job.created_at,
                scheduled_at: job.scheduled_at,
                started_at: None,
                completed_at: None,
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Job>> {
        let mut due: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.is_due(now))
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|job| (job.priority.rank(), job.scheduled_at, job.id));
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        Ok(self.transition(id, JobStatus::Pending, |job| {
            job.status = JobStatus::Processing;
            job.attempts += 1;
            job.started_at = Some(now);
        }))
    }

    async fn complete(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let updated = self.transition(id, JobStatus::Processing, |job| {
            job.status = JobStatus::Completed;
            job.completed_at = Some(now);
        });
        Ok(updated.is_some())
    }

    async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool> {
        let updated = self.transition(id, JobStatus::Processing, |job| {
            job.status = JobStatus::Pending;
            job.scheduled_at = scheduled_at.max(job.created_at);
            job.last_error = Some(error.to_string());
        });
        Ok(updated.is_some())
    }

    async fn dead_letter(&self, id: i64, from: JobStatus, error: &str) -> AppResult<bool> {
        let updated = self.transition(id, from, |job| {
            job.status = JobStatus::DeadLetter;
            job.last_error = Some(error.to_string());
        });
        Ok(updated.is_some())
    }

    async fn count_by_status(&self) -> AppResult<Vec<(JobStatus, i64)>> {
        let counts = JobStatus::ALL
            .into_iter()
            .map(|status| {
                let count = self.jobs.iter().filter(|e| e.status == status).count();
                (status, count as i64)
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        Ok(counts)
    }

    async fn purge_terminal(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut purged = 0;
        self.jobs.retain(|_, job| {
            let expired = job.status.is_terminal() && job.last_activity() < before;
            if expired {
                purged += 1;
            }
            !expired
        });
        Ok(purged)
    }

    async fn recover_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut recovered = 0;
        for mut entry in self.jobs.iter_mut() {
            let stale = match entry.status {
                JobStatus::Processing => entry.started_at.is_some_and(|at| at < before),
                JobStatus::Failed => entry.started_at.unwrap_or(entry.created_at) < before,
                _ => false,
            };
            if stale {
                entry.status = JobStatus::Pending;
                entry.started_at = None;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> AppResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| (b.scheduled_at, b.id).cmp(&(a.scheduled_at, a.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn requeue_dead_letter(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let updated = self.transition(id, JobStatus::DeadLetter, |job| {
            job.status = JobStatus::Pending;
            job.attempts = 0;
            job.scheduled_at = now.max(job.created_at);
            job.started_at = None;
            job.completed_at = None;
        });
        Ok(updated.is_some())
    }
}
