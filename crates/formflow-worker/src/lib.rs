//! Background job queue for Formflow.
//!
//! This crate provides:
//! - A durable job store abstraction with PostgreSQL and in-memory backends
//! - The queue manager: enqueue, drain, retry policy, dead letters and cleanup
//! - The handler contract and registry
//! - The signature status poller
//! - A cron trigger that drains the queue and runs cleanup

pub mod bootstrap;
pub mod events;
pub mod executor;
pub mod jobs;
pub mod producer;
pub mod provider;
pub mod queue;
pub mod scheduler;
pub mod store;

pub use executor::{JobExecutionError, JobHandler, JobPayload, TypedJobHandler};
pub use producer::{EnqueueParams, JobProducer};
pub use queue::{CleanupReport, DrainReport, QueueManager};
pub use scheduler::CronScheduler;
pub use store::{JobStore, MemoryJobStore};
