//! Queue manager: enqueue, drain, failure policy, cleanup and stats.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing;

use formflow_core::config::QueueConfig;
use formflow_core::error::{AppError, ErrorKind};
use formflow_core::events::QueueEvent;
use formflow_core::result::AppResult;
use formflow_core::traits::events::EventSink;
use formflow_entity::job::{Job, JobPriority, JobStats, JobStatus};

use crate::executor::{JobExecutionError, JobExecutor, JobHandler, TypedJobHandler};
use crate::producer::{EnqueueParams, JobProducer};
use crate::store::JobStore;

/// Longest retry delay the backoff will produce.
pub const MAX_BACKOFF_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Outcome counts of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Due jobs selected for this pass
    pub selected: usize,
    /// Jobs this pass claimed
    pub claimed: usize,
    /// Jobs whose handler succeeded
    pub completed: usize,
    /// Jobs put back to pending with a backoff
    pub retried: usize,
    /// Jobs moved to dead_letter
    pub dead_lettered: usize,
    /// Jobs another worker got to first
    pub skipped: usize,
    /// Jobs whose bookkeeping failed on a store error
    pub errors: usize,
}

/// Outcome counts of one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Terminal jobs deleted
    pub purged: u64,
    /// Orphaned jobs returned to pending
    pub recovered: u64,
}

enum FailureOutcome {
    Retried,
    DeadLettered,
    Lost,
}

/// Owns the job store, the handler registry and the retry policy.
#[derive(Debug)]
pub struct QueueManager {
    /// Persistence backend
    store: Arc<dyn JobStore>,
    /// Registered handlers by job type
    handlers: JobExecutor,
    /// Destination for dead-letter and cleanup events
    events: Arc<dyn EventSink>,
    /// Queue settings
    config: QueueConfig,
    /// Shared enqueue handle
    producer: JobProducer,
}

impl QueueManager {
    /// Create a queue manager with no handlers registered
    pub fn new(store: Arc<dyn JobStore>, events: Arc<dyn EventSink>, config: QueueConfig) -> Self {
        let producer = JobProducer::new(Arc::clone(&store), config.max_attempts);
        Self {
            store,
            handlers: JobExecutor::new(),
            events,
            config,
            producer,
        }
    }

    /// Enqueue handle for handlers that schedule follow-up work
    pub fn producer(&self) -> JobProducer {
        self.producer.clone()
    }

    /// Queue settings
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Registered handler types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.registered_types()
    }

    /// Register a JSON-level handler
    pub fn register_handler(&mut self, handler: Arc<dyn JobHandler>) -> AppResult<()> {
        self.handlers.register(handler)
    }

    /// Register a typed handler under its payload's job type
    pub fn register<H: TypedJobHandler>(&mut self, handler: H) -> AppResult<()> {
        self.handlers.register_typed(handler)
    }

    /// Register an async closure as the handler for `job_type`
    pub fn register_fn<F, Fut>(&mut self, job_type: &str, f: F) -> AppResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), JobExecutionError>> + Send + 'static,
    {
        self.handlers.register_fn(job_type, f)
    }

    /// Enqueue a job and return its ID.
    ///
    /// The job becomes due `delay` after now. Store failures are returned to
    /// the caller.
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        job_type: &str,
        payload: &T,
        priority: JobPriority,
        delay: Duration,
    ) -> AppResult<i64> {
        let payload = serde_json::to_value(payload)?;
        let params = EnqueueParams::new(job_type, payload)
            .with_priority(priority)
            .with_delay(delay);
        self.producer.enqueue(params).await
    }

    /// Drain one batch of the configured size
    pub async fn drain(&self) -> AppResult<DrainReport> {
        self.drain_batch(self.config.batch_size).await
    }

    /// Claim and run up to `batch_size` due jobs, highest priority and oldest first.
    ///
    /// Handler failures never escape; only a failure to select the batch is
    /// returned. Bookkeeping failures of a single job are logged and counted.
    pub async fn drain_batch(&self, batch_size: usize) -> AppResult<DrainReport> {
        let mut report = DrainReport::default();
        if batch_size == 0 {
            return Ok(report);
        }

        let due = self.store.select_due(Utc::now(), batch_size).await?;
        report.selected = due.len();

        for job in due {
            let job_id = job.id;
            if let Err(e) = self.process(job, &mut report).await {
                report.errors += 1;
                tracing::error!("Bookkeeping failed for job {}: {}", job_id, e);
            }
        }

        if report.selected > 0 {
            tracing::info!(
                "Drain finished: selected={}, completed={}, retried={}, dead_lettered={}, skipped={}, errors={}",
                report.selected,
                report.completed,
                report.retried,
                report.dead_lettered,
                report.skipped,
                report.errors
            );
        }

        Ok(report)
    }

    async fn process(&self, job: Job, report: &mut DrainReport) -> AppResult<()> {
        let Some(handler) = self.handlers.get(&job.job_type) else {
            let error = format!("No handler registered for job type '{}'", job.job_type);
            return self.dead_letter_pending(&job, &error, report).await;
        };

        if !job.can_retry() {
            let error = job
                .last_error
                .clone()
                .unwrap_or_else(|| format!("Attempts exhausted ({}/{})", job.attempts, job.max_attempts));
            return self.dead_letter_pending(&job, &error, report).await;
        }

        let Some(claimed) = self.store.claim(job.id, Utc::now()).await? else {
            tracing::debug!("Job {} already claimed by another worker", job.id);
            report.skipped += 1;
            return Ok(());
        };
        report.claimed += 1;

        tracing::debug!(
            "Processing job: id={}, type='{}', attempt={}/{}",
            claimed.id,
            claimed.job_type,
            claimed.attempts,
            claimed.max_attempts
        );

        let result = match AssertUnwindSafe(handler.execute(&claimed.payload))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(JobExecutionError::Transient(format!(
                "Handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match result {
            Ok(()) => {
                if self.store.complete(claimed.id, Utc::now()).await? {
                    report.completed += 1;
                    tracing::debug!("Job {} completed", claimed.id);
                } else {
                    tracing::warn!("Job {} was no longer processing when it completed", claimed.id);
                }
            }
            Err(err) => match self.on_failure(&claimed, &err).await? {
                FailureOutcome::Retried => report.retried += 1,
                FailureOutcome::DeadLettered => report.dead_lettered += 1,
                FailureOutcome::Lost => {}
            },
        }

        Ok(())
    }

    /// Move a still-pending job straight to dead_letter without consuming an attempt.
    async fn dead_letter_pending(
        &self,
        job: &Job,
        error: &str,
        report: &mut DrainReport,
    ) -> AppResult<()> {
        let error = truncate_error(error, self.config.max_error_bytes);
        if self
            .store
            .dead_letter(job.id, JobStatus::Pending, &error)
            .await?
        {
            report.dead_lettered += 1;
            tracing::error!("Job {} ('{}') dead-lettered: {}", job.id, job.job_type, error);
            self.emit_dead_lettered(job, job.attempts, error).await;
        } else {
            report.skipped += 1;
        }
        Ok(())
    }

    /// Apply the retry policy to a claimed job whose handler failed.
    async fn on_failure(&self, job: &Job, err: &JobExecutionError) -> AppResult<FailureOutcome> {
        let error = truncate_error(&err.message(), self.config.max_error_bytes);

        if err.is_permanent() || !job.can_retry() {
            if !self
                .store
                .dead_letter(job.id, JobStatus::Processing, &error)
                .await?
            {
                tracing::warn!("Job {} was no longer processing when it failed", job.id);
                return Ok(FailureOutcome::Lost);
            }
            tracing::error!(
                "Job {} ('{}') dead-lettered after {}/{} attempts: {}",
                job.id,
                job.job_type,
                job.attempts,
                job.max_attempts,
                error
            );
            self.emit_dead_lettered(job, job.attempts, error).await;
            return Ok(FailureOutcome::DeadLettered);
        }

        let delay = backoff_delay(self.config.base_delay_seconds, job.attempts);
        let scheduled_at = Utc::now() + delay;
        if !self.store.reschedule(job.id, scheduled_at, &error).await? {
            tracing::warn!("Job {} was no longer processing when it failed", job.id);
            return Ok(FailureOutcome::Lost);
        }

        tracing::warn!(
            "Job {} ('{}') failed (attempt {}/{}), retrying in {}s: {}",
            job.id,
            job.job_type,
            job.attempts,
            job.max_attempts,
            delay.num_seconds(),
            error
        );
        Ok(FailureOutcome::Retried)
    }

    async fn emit_dead_lettered(&self, job: &Job, attempts: i32, error: String) {
        self.events
            .emit(
                QueueEvent::JobDeadLettered {
                    job_id: job.id,
                    job_type: job.job_type.clone(),
                    attempts,
                    error,
                }
                .into(),
            )
            .await;
    }

    /// Cleanup with the configured retention and staleness threshold
    pub async fn cleanup(&self) -> AppResult<CleanupReport> {
        self.cleanup_with(self.config.retention_days, self.config.stale_threshold())
            .await
    }

    /// Purge terminal jobs older than `retention_days` and return jobs stuck
    /// in processing for longer than `stale_threshold` to pending.
    pub async fn cleanup_with(
        &self,
        retention_days: u32,
        stale_threshold: Duration,
    ) -> AppResult<CleanupReport> {
        let now = Utc::now();
        let stale = chrono::Duration::from_std(stale_threshold).map_err(|e| {
            AppError::with_source(ErrorKind::Validation, "Stale threshold out of range", e)
        })?;

        let retention_cutoff = now
            .checked_sub_signed(chrono::Duration::days(i64::from(retention_days)))
            .ok_or_else(|| AppError::validation("Retention period out of range"))?;
        let stale_cutoff = now
            .checked_sub_signed(stale)
            .ok_or_else(|| AppError::validation("Stale threshold out of range"))?;

        let purged = self.store.purge_terminal(retention_cutoff).await?;
        let recovered = self.store.recover_stale(stale_cutoff).await?;

        if purged > 0 {
            self.events.emit(QueueEvent::JobsPurged { count: purged }.into()).await;
        }
        if recovered > 0 {
            tracing::warn!("Recovered {} stale jobs", recovered);
            self.events
                .emit(QueueEvent::StaleJobsRecovered { count: recovered }.into())
                .await;
        }

        tracing::info!("Cleanup finished: purged={}, recovered={}", purged, recovered);
        Ok(CleanupReport { purged, recovered })
    }

    /// Job counts for every status, zero-filled
    pub async fn stats(&self) -> AppResult<JobStats> {
        Ok(JobStats::from_counts(self.store.count_by_status().await?))
    }

    /// Look up a single job
    pub async fn get_job(&self, id: i64) -> AppResult<Job> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {} not found", id)))
    }

    /// Most recent dead-lettered jobs
    pub async fn dead_letters(&self, limit: usize) -> AppResult<Vec<Job>> {
        self.store.list_by_status(JobStatus::DeadLetter, limit).await
    }

    /// Put a dead-lettered job back in the queue with a fresh attempt budget
    pub async fn retry_dead_letter(&self, id: i64) -> AppResult<()> {
        let job = self.get_job(id).await?;
        if job.status != JobStatus::DeadLetter {
            return Err(AppError::conflict(format!(
                "Job {} is {}, not dead_letter",
                id, job.status
            )));
        }
        if !self.store.requeue_dead_letter(id, Utc::now()).await? {
            return Err(AppError::conflict(format!(
                "Job {} left dead_letter concurrently",
                id
            )));
        }

        tracing::info!("Dead-lettered job {} ('{}') requeued", id, job.job_type);
        Ok(())
    }
}

/// Retry delay after the `attempts`-th failed attempt: `base * 3^(attempts - 1)`.
///
/// Capped at [`MAX_BACKOFF_SECONDS`].
pub fn backoff_delay(base_seconds: u64, attempts: i32) -> chrono::Duration {
    let exponent = u32::try_from(attempts.saturating_sub(1).max(0)).unwrap_or(0);
    let seconds = 3u64
        .checked_pow(exponent)
        .and_then(|factor| base_seconds.checked_mul(factor))
        .unwrap_or(MAX_BACKOFF_SECONDS)
        .min(MAX_BACKOFF_SECONDS);
    chrono::Duration::seconds(seconds as i64)
}

/// Shorten `message` to at most `max_bytes`, cutting on a char boundary.
pub fn truncate_error(message: &str, max_bytes: usize) -> String {
    if message.len() <= max_bytes {
        return message.to_string();
    }
    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use formflow_core::events::EventPayload;
    use formflow_entity::job::CreateJob;

    use crate::events::BroadcastEventSink;
    use crate::executor::JobPayload;
    use crate::store::MemoryJobStore;

    fn config(base_delay_seconds: u64) -> QueueConfig {
        QueueConfig {
            base_delay_seconds,
            ..QueueConfig::default()
        }
    }

    fn manager(config: QueueConfig) -> (QueueManager, MemoryJobStore, BroadcastEventSink) {
        let store = MemoryJobStore::new();
        let events = BroadcastEventSink::new(64);
        let queue = QueueManager::new(
            Arc::new(store.clone()),
            Arc::new(events.clone()),
            config,
        );
        (queue, store, events)
    }

    type Outcome = futures::future::Ready<Result<(), JobExecutionError>>;

    fn failing(counter: Arc<AtomicUsize>) -> impl Fn(Value) -> Outcome + Send + Sync + 'static {
        move |_payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Err(JobExecutionError::Transient("SMTP timeout".to_string())))
        }
    }

    async fn ok(_payload: Value) -> Result<(), JobExecutionError> {
        Ok(())
    }

    async fn crash(_payload: Value) -> Result<(), JobExecutionError> {
        panic!("renderer crashed")
    }

    #[tokio::test]
    async fn test_drain_runs_in_priority_then_age_order() {
        let (mut queue, _store, _events) = manager(config(60));
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        queue
            .register_fn("email_send", move |payload| {
                seen.lock().unwrap().push(payload["name"].as_str().unwrap_or_default().to_string());
                futures::future::ready(Ok::<(), JobExecutionError>(()))
            })
            .unwrap();

        for (name, priority) in [
            ("low", JobPriority::Low),
            ("medium-1", JobPriority::Medium),
            ("high", JobPriority::High),
            ("medium-2", JobPriority::Medium),
        ] {
            queue
                .enqueue("email_send", &serde_json::json!({"name": name}), priority, Duration::ZERO)
                .await
                .unwrap();
        }

        let report = queue.drain().await.unwrap();
        assert_eq!(report.completed, 4);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["high", "medium-1", "medium-2", "low"]
        );
    }

    #[tokio::test]
    async fn test_same_priority_runs_earliest_scheduled_first() {
        let (mut queue, store, _events) = manager(config(60));
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        queue
            .register_fn("pdf_render", move |payload| {
                seen.lock().unwrap().push(payload["name"].as_str().unwrap_or_default().to_string());
                futures::future::ready(Ok::<(), JobExecutionError>(()))
            })
            .unwrap();

        let mut newer = old_job(chrono::Duration::minutes(1));
        newer.payload = serde_json::json!({"name": "newer"});
        let mut older = old_job(chrono::Duration::minutes(10));
        older.payload = serde_json::json!({"name": "older"});
        let newer_id = store.insert(&newer).await.unwrap();
        let older_id = store.insert(&older).await.unwrap();
        assert!(newer_id < older_id);

        let report = queue.drain().await.unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(*order.lock().unwrap(), vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn test_drain_processes_at_most_batch_size() {
        let (mut queue, _store, _events) = manager(config(60));
        queue.register_fn("pdf_render", ok).unwrap();
        for i in 0..15 {
            queue
                .enqueue("pdf_render", &serde_json::json!({"i": i}), JobPriority::Medium, Duration::ZERO)
                .await
                .unwrap();
        }

        let first = queue.drain().await.unwrap();
        assert_eq!(first.selected, 10);
        assert_eq!(first.completed, 10);

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 5);
        assert_eq!(stats.completed, 10);
    }

    #[tokio::test]
    async fn test_delayed_job_is_not_due() {
        let (mut queue, store, _events) = manager(config(60));
        queue.register_fn("pdf_render", ok).unwrap();
        let id = queue
            .enqueue("pdf_render", &serde_json::json!({}), JobPriority::High, Duration::from_secs(600))
            .await
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.selected, 0);
        assert_eq!(store.find_by_id(id).await.unwrap().unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_transient_failure_reschedules_with_backoff() {
        let (mut queue, store, _events) = manager(config(60));
        let calls = Arc::new(AtomicUsize::new(0));
        queue.register_fn("email_send", failing(Arc::clone(&calls))).unwrap();
        let id = queue
            .enqueue("email_send", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.retried, 1);

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("SMTP timeout"));
        let delay = (job.scheduled_at - job.started_at.unwrap()).num_seconds();
        assert!((60..62).contains(&delay), "unexpected backoff {}s", delay);

        // Not due again until the backoff elapses.
        assert_eq!(queue.drain().await.unwrap().selected, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_by_factor_three() {
        assert_eq!(backoff_delay(60, 1).num_seconds(), 60);
        assert_eq!(backoff_delay(60, 2).num_seconds(), 180);
        assert_eq!(backoff_delay(60, 3).num_seconds(), 540);
        assert_eq!(backoff_delay(60, 0).num_seconds(), 60);
        assert_eq!(backoff_delay(0, 3).num_seconds(), 0);
        assert_eq!(backoff_delay(60, 500).num_seconds() as u64, MAX_BACKOFF_SECONDS);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let (mut queue, store, events) = manager(config(0));
        let mut rx = events.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        queue.register_fn("email_send", failing(Arc::clone(&calls))).unwrap();
        let id = queue
            .enqueue("email_send", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(queue.drain().await.unwrap().retried, 1);
        assert_eq!(queue.drain().await.unwrap().retried, 1);
        assert_eq!(queue.drain().await.unwrap().dead_lettered, 1);
        assert_eq!(queue.drain().await.unwrap().selected, 0);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.last_error.as_deref(), Some("SMTP timeout"));

        let event = rx.try_recv().unwrap();
        match event.payload {
            EventPayload::Queue(QueueEvent::JobDeadLettered { job_id, attempts, .. }) => {
                assert_eq!(job_id, id);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_dead_lettered_without_attempt() {
        let (queue, store, events) = manager(config(60));
        let mut rx = events.subscribe();
        let id = queue
            .enqueue("mystery", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.claimed, 0);

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.unwrap().contains("mystery"));
        assert_eq!(rx.try_recv().unwrap().name(), "queue.job_dead_lettered");
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct RenderPdf {
        submission_id: i64,
    }

    impl JobPayload for RenderPdf {
        const JOB_TYPE: &'static str = "pdf_render";
    }

    #[derive(Debug, Default)]
    struct RenderHandler {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TypedJobHandler for Arc<RenderHandler> {
        type Payload = RenderPdf;

        async fn handle(&self, _payload: RenderPdf) -> Result<(), JobExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dead_lettered_immediately() {
        let (mut queue, store, _events) = manager(config(60));
        let handler = Arc::new(RenderHandler::default());
        queue.register(Arc::clone(&handler)).unwrap();

        let good = queue
            .enqueue("pdf_render", &RenderPdf { submission_id: 7 }, JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();
        let bad = queue
            .enqueue("pdf_render", &serde_json::json!({"wrong": true}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        assert_eq!(store.find_by_id(good).await.unwrap().unwrap().status, JobStatus::Completed);
        let bad = store.find_by_id(bad).await.unwrap().unwrap();
        assert_eq!(bad.status, JobStatus::DeadLetter);
        assert_eq!(bad.attempts, 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_retried() {
        let (mut queue, store, _events) = manager(config(60));
        queue
            .register_fn("pdf_render", crash)
            .unwrap();
        let id = queue
            .enqueue("pdf_render", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.retried, 1);

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.last_error.unwrap().contains("renderer crashed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_drains_run_each_job_once() {
        let (mut queue, _store, _events) = manager(config(60));
        let runs: Arc<Mutex<HashMap<i64, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let seen = Arc::clone(&runs);
        queue
            .register_fn("email_send", move |payload| {
                let id = payload["n"].as_i64().unwrap_or(-1);
                *seen.lock().unwrap().entry(id).or_insert(0) += 1;
                async {
                    tokio::task::yield_now().await;
                    Ok::<(), JobExecutionError>(())
                }
            })
            .unwrap();

        for n in 0..50 {
            queue
                .enqueue("email_send", &serde_json::json!({"n": n}), JobPriority::Medium, Duration::ZERO)
                .await
                .unwrap();
        }

        let queue = Arc::new(queue);
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            tasks.push(tokio::spawn(async move { queue.drain_batch(50).await.unwrap() }));
        }

        let mut claimed = 0;
        let mut completed = 0;
        for task in tasks {
            let report = task.await.unwrap();
            claimed += report.claimed;
            completed += report.completed;
        }

        assert_eq!(claimed, 50);
        assert_eq!(completed, 50);
        let runs = runs.lock().unwrap();
        assert_eq!(runs.len(), 50);
        assert!(runs.values().all(|count| *count == 1));
    }

    #[tokio::test]
    async fn test_stats_are_zero_filled() {
        let (mut queue, _store, _events) = manager(config(60));
        let empty = queue.stats().await.unwrap();
        assert_eq!(empty, JobStats::default());

        queue.register_fn("pdf_render", ok).unwrap();
        queue
            .enqueue("pdf_render", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();
        queue
            .enqueue("pdf_render", &serde_json::json!({}), JobPriority::Medium, Duration::from_secs(3600))
            .await
            .unwrap();
        queue.drain().await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.dead_letter, 0);
    }

    fn old_job(age: chrono::Duration) -> CreateJob {
        let created_at = Utc::now() - age;
        CreateJob {
            job_type: "pdf_render".to_string(),
            priority: JobPriority::Medium,
            payload: serde_json::json!({}),
            max_attempts: 3,
            created_at,
            scheduled_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_cleanup_recovers_stale_jobs_keeping_attempts() {
        let (mut queue, store, events) = manager(config(60));
        let mut rx = events.subscribe();
        queue.register_fn("pdf_render", ok).unwrap();

        let id = store.insert(&old_job(chrono::Duration::hours(3))).await.unwrap();
        store.claim(id, Utc::now() - chrono::Duration::hours(2)).await.unwrap();

        let report = queue.cleanup().await.unwrap();
        assert_eq!(report, CleanupReport { purged: 0, recovered: 1 });
        assert_eq!(rx.try_recv().unwrap().name(), "queue.stale_jobs_recovered");

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);

        assert_eq!(queue.drain().await.unwrap().completed, 1);
        assert_eq!(store.find_by_id(id).await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_recovered_job_without_attempts_left_is_dead_lettered() {
        let (mut queue, store, _events) = manager(config(60));
        queue.register_fn("pdf_render", ok).unwrap();

        let mut create = old_job(chrono::Duration::hours(3));
        create.max_attempts = 1;
        let id = store.insert(&create).await.unwrap();
        store.claim(id, Utc::now() - chrono::Duration::hours(2)).await.unwrap();
        queue.cleanup().await.unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.claimed, 0);

        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_cleanup_purges_old_terminal_jobs() {
        let (queue, store, events) = manager(config(60));
        let mut rx = events.subscribe();

        let old = store.insert(&old_job(chrono::Duration::days(45))).await.unwrap();
        let when = Utc::now() - chrono::Duration::days(40);
        store.claim(old, when).await.unwrap();
        store.complete(old, when).await.unwrap();

        let recent = store.insert(&old_job(chrono::Duration::days(2))).await.unwrap();
        store.dead_letter(recent, JobStatus::Pending, "boom").await.unwrap();

        let report = queue.cleanup_with(30, Duration::from_secs(3600)).await.unwrap();
        assert_eq!(report.purged, 1);
        assert!(store.find_by_id(old).await.unwrap().is_none());
        assert!(store.find_by_id(recent).await.unwrap().is_some());
        assert_eq!(rx.try_recv().unwrap().name(), "queue.jobs_purged");
    }

    #[tokio::test]
    async fn test_cleanup_rejects_cutoffs_before_calendar_range() {
        let (queue, store, _events) = manager(config(60));
        let id = store.insert(&old_job(chrono::Duration::days(45))).await.unwrap();

        let err = queue
            .cleanup_with(u32::MAX, Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = queue
            .cleanup_with(30, Duration::from_secs(10_000_000_000_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        assert!(store.find_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retry_dead_letter_resets_attempts() {
        let (mut queue, store, _events) = manager(config(60));
        let id = queue
            .enqueue("pdf_render", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap();
        queue.drain().await.unwrap();
        assert_eq!(queue.dead_letters(10).await.unwrap().len(), 1);

        queue.register_fn("pdf_render", ok).unwrap();
        queue.retry_dead_letter(id).await.unwrap();
        let job = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);

        let conflict = queue.retry_dead_letter(id).await.unwrap_err();
        assert_eq!(conflict.kind, ErrorKind::Conflict);
        let missing = queue.retry_dead_letter(9_999).await.unwrap_err();
        assert_eq!(missing.kind, ErrorKind::NotFound);

        assert_eq!(queue.drain().await.unwrap().completed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_job_type() {
        let (queue, store, _events) = manager(config(60));
        let err = queue
            .enqueue("", &serde_json::json!({}), JobPriority::Medium, Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[test]
    fn test_truncate_error_respects_char_boundaries() {
        assert_eq!(truncate_error("short", 10), "short");
        assert_eq!(truncate_error("abcdef", 3), "abc");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_error("aé", 2), "a");
        assert_eq!(truncate_error(&"x".repeat(70_000), 65_535).len(), 65_535);
    }
}
