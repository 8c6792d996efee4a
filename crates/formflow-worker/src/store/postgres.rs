//! PostgreSQL-backed job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use formflow_core::result::AppResult;
use formflow_database::repositories::job::JobRepository;
use formflow_entity::job::{CreateJob, Job, JobStatus};

use super::JobStore;

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert(&self, job: &CreateJob) -> AppResult<i64> {
        JobRepository::insert(self, job).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Job>> {
        JobRepository::find_by_id(self, id).await
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Job>> {
        JobRepository::select_due(self, now, sql_limit(limit)).await
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Job>> {
        JobRepository::claim(self, id, now).await
    }

    async fn complete(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        JobRepository::complete(self, id, now).await
    }

    async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool> {
        JobRepository::reschedule(self, id, scheduled_at, error).await
    }

    async fn dead_letter(&self, id: i64, from: JobStatus, error: &str) -> AppResult<bool> {
        JobRepository::dead_letter(self, id, from, error).await
    }

    async fn count_by_status(&self) -> AppResult<Vec<(JobStatus, i64)>> {
        JobRepository::count_by_status(self).await
    }

    async fn purge_terminal(&self, before: DateTime<Utc>) -> AppResult<u64> {
        JobRepository::purge_terminal(self, before).await
    }

    async fn recover_stale(&self, before: DateTime<Utc>) -> AppResult<u64> {
        JobRepository::recover_stale(self, before).await
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> AppResult<Vec<Job>> {
        JobRepository::list_by_status(self, status, sql_limit(limit)).await
    }

    async fn requeue_dead_letter(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        JobRepository::requeue_dead_letter(self, id, now).await
    }
}
