//! Periodic trigger configuration.

use serde::{Deserialize, Serialize};

/// Cron expressions (with seconds field) for the queue's periodic triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the daemon starts the cron trigger at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When to drain the queue.
    #[serde(default = "default_drain_cron")]
    pub drain_cron: String,
    /// When to purge old jobs and recover stale ones.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drain_cron: default_drain_cron(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_drain_cron() -> String {
    "0 */5 * * * *".to_string()
}

fn default_cleanup_cron() -> String {
    "0 0 3 * * *".to_string()
}
