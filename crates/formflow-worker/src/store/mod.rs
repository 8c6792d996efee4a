//! Job store abstraction.
//!
//! The store is the only shared mutable resource of the queue. Every
//! transition it offers is conditional on the row's current status and must
//! be evaluated atomically by the backend, never as read-then-write in
//! application code.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use formflow_core::result::AppResult;
use formflow_entity::job::{CreateJob, Job, JobStatus};

pub use memory::MemoryJobStore;

/// Persistence operations the queue manager needs. No business logic lives here.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a pending job and return its ID.
    async fn insert(&self, job: &CreateJob) -> AppResult<i64>;

    /// Read a job by ID.
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Job>>;

    /// Up to `limit` pending jobs with `scheduled_at <= now`, ordered
    /// high > medium > low, then `scheduled_at` ascending, then ID.
    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> AppResult<Vec<Job>>;

    /// `pending -> processing`, `attempts + 1`, `started_at = now`.
    ///
    /// Returns `None` when the row was no longer pending (another worker won).
    async fn claim(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Job>>;

    /// `processing -> completed`. Returns whether the row matched.
    async fn complete(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool>;

    /// `processing -> pending` with a new `scheduled_at` and `last_error`.
    async fn reschedule(
        &self,
        id: i64,
        scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool>;

    /// `from -> dead_letter` with `last_error`.
    async fn dead_letter(&self, id: i64, from: JobStatus, error: &str) -> AppResult<bool>;

    /// `(status, count)` for every status that has rows.
    async fn count_by_status(&self) -> AppResult<Vec<(JobStatus, i64)>>;

    /// Delete completed and dead-lettered jobs last active before `before`.
    async fn purge_terminal(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// Return processing jobs started before `before` (and failed jobs last
    /// active before it) to pending, clearing `started_at`.
    async fn recover_stale(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// Jobs in `status`, most recently scheduled first.
    async fn list_by_status(&self, status: JobStatus, limit: usize) -> AppResult<Vec<Job>>;

    /// `dead_letter -> pending` with attempts reset and `scheduled_at = now`.
    async fn requeue_dead_letter(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool>;
}
