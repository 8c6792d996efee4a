//! Wiring of the queue manager and the built-in handlers.

use std::sync::Arc;

use sqlx::PgPool;

use formflow_core::config::AppConfig;
use formflow_core::result::AppResult;
use formflow_core::traits::events::EventSink;
use formflow_database::repositories::job::JobRepository;
use formflow_database::repositories::submission::SubmissionRepository;

use crate::events::TracingEventSink;
use crate::jobs::signature::{SignatureProvider, SignatureStatusHandler, SubmissionStore};
use crate::provider::HttpSignatureProvider;
use crate::queue::QueueManager;
use crate::store::JobStore;

/// Build a queue manager over explicit collaborators and register the
/// signature poller on it.
pub fn assemble(
    config: &AppConfig,
    store: Arc<dyn JobStore>,
    submissions: Arc<dyn SubmissionStore>,
    provider: Arc<dyn SignatureProvider>,
    events: Arc<dyn EventSink>,
) -> AppResult<QueueManager> {
    let mut queue = QueueManager::new(store, Arc::clone(&events), config.queue.clone());

    let poller = SignatureStatusHandler::new(
        submissions,
        provider,
        queue.producer(),
        events,
        config.signature.poll_interval(),
        config.signature.max_checks,
    );
    queue.register(poller)?;

    Ok(queue)
}

/// Build the production queue manager on PostgreSQL and the HTTP provider.
///
/// Further handlers can be registered on the result before the first drain.
pub fn build_queue(config: &AppConfig, pool: PgPool) -> AppResult<QueueManager> {
    let provider = HttpSignatureProvider::new(&config.signature)?;

    let queue = assemble(
        config,
        Arc::new(JobRepository::new(pool.clone())),
        Arc::new(SubmissionRepository::new(pool)),
        Arc::new(provider),
        Arc::new(TracingEventSink),
    )?;

    tracing::info!(
        "Job queue ready with handlers: {:?}",
        queue.registered_types()
    );
    Ok(queue)
}
