//! Cron trigger for draining the queue and running cleanup.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use formflow_core::config::SchedulerConfig;
use formflow_core::error::AppError;

use crate::queue::QueueManager;

/// Periodically drives [`QueueManager::drain`] and [`QueueManager::cleanup`].
///
/// Ticks may overlap; the store's conditional claim keeps that safe.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Queue driven by the ticks
    queue: Arc<QueueManager>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(queue: Arc<QueueManager>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, queue })
    }

    /// Register the drain and cleanup ticks from configuration
    pub async fn register_default_tasks(&self, config: &SchedulerConfig) -> Result<(), AppError> {
        self.register_drain(&config.drain_cron).await?;
        self.register_cleanup(&config.cleanup_cron).await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Drain one batch on every tick of `cron`
    pub async fn register_drain(&self, cron: &str) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async(cron, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::trace!("Drain tick");
                if let Err(e) = queue.drain().await {
                    tracing::error!("Queue drain failed: {}", e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create drain schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add drain schedule: {}", e)))?;

        tracing::info!("Registered: queue drain ({})", cron);
        Ok(())
    }

    /// Run cleanup on every tick of `cron`
    pub async fn register_cleanup(&self, cron: &str) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async(cron, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Cleanup tick");
                if let Err(e) = queue.cleanup().await {
                    tracing::error!("Queue cleanup failed: {}", e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create cleanup schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add cleanup schedule: {}", e)))?;

        tracing::info!("Registered: queue cleanup ({})", cron);
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
