//! Aggregated queue counts.

use serde::{Deserialize, Serialize};

use super::status::JobStatus;

/// Number of jobs per status. Every field is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Pending jobs.
    pub pending: i64,
    /// Jobs currently claimed.
    pub processing: i64,
    /// Successfully completed jobs.
    pub completed: i64,
    /// Failed jobs awaiting recovery.
    pub failed: i64,
    /// Dead-lettered jobs.
    pub dead_letter: i64,
}

impl JobStats {
    /// Build stats from `(status, count)` rows; statuses without rows stay zero.
    pub fn from_counts(counts: impl IntoIterator<Item = (JobStatus, i64)>) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            *stats.slot_mut(status) += count;
        }
        stats
    }

    /// Count for a single status.
    pub fn get(&self, status: JobStatus) -> i64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::DeadLetter => self.dead_letter,
        }
    }

    /// Sum over all statuses.
    pub fn total(&self) -> i64 {
        JobStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot_mut(&mut self, status: JobStatus) -> &mut i64 {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Processing => &mut self.processing,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::DeadLetter => &mut self.dead_letter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_statuses_are_zero() {
        let stats = JobStats::from_counts([(JobStatus::Pending, 4), (JobStatus::DeadLetter, 1)]);
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.dead_letter, 1);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_serialized_stats_always_have_five_keys() {
        let value = serde_json::to_value(JobStats::default()).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 5);
        for key in ["pending", "processing", "completed", "failed", "dead_letter"] {
            assert_eq!(value[key], 0);
        }
    }
}
