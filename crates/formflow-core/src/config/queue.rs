//! Job queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest `last_error` value the job table accepts (TEXT column budget).
pub const MAX_ERROR_BYTES: usize = 65_535;

/// Background job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of jobs selected by one drain.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts allowed per job, snapshotted onto each row at enqueue time.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Base of the exponential retry backoff, in seconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: u64,
    /// Days completed and dead-lettered jobs are kept before cleanup purges them.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Minutes after which a `processing` job is considered orphaned.
    #[serde(default = "default_stale_after")]
    pub stale_after_minutes: u64,
    /// Maximum stored length of `last_error`, in bytes.
    #[serde(default = "default_max_error_bytes")]
    pub max_error_bytes: usize,
}

impl QueueConfig {
    /// Staleness threshold as a duration.
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_after_minutes.saturating_mul(60))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay(),
            retention_days: default_retention_days(),
            stale_after_minutes: default_stale_after(),
            max_error_bytes: default_max_error_bytes(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_max_attempts() -> i32 {
    3
}

fn default_base_delay() -> u64 {
    60
}

fn default_retention_days() -> u32 {
    30
}

fn default_stale_after() -> u64 {
    60
}

fn default_max_error_bytes() -> usize {
    MAX_ERROR_BYTES
}
