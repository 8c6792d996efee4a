//! Job queue domain events.

use serde::{Deserialize, Serialize};

/// Events raised by the queue manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A job exhausted its attempts or failed permanently and will not be retried.
    JobDeadLettered {
        /// Job ID.
        job_id: i64,
        /// Job type.
        job_type: String,
        /// Attempts consumed when the job was dead-lettered.
        attempts: i32,
        /// Last (truncated) error.
        error: String,
    },
    /// Cleanup moved orphaned jobs back to `pending`.
    StaleJobsRecovered {
        /// Number of recovered rows.
        count: u64,
    },
    /// Cleanup deleted terminal jobs past the retention window.
    JobsPurged {
        /// Number of deleted rows.
        count: u64,
    },
}

impl QueueEvent {
    /// Dotted event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JobDeadLettered { .. } => "queue.job_dead_lettered",
            Self::StaleJobsRecovered { .. } => "queue.stale_jobs_recovered",
            Self::JobsPurged { .. } => "queue.jobs_purged",
        }
    }
}
