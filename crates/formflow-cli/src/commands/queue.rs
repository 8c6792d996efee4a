//! Job queue CLI commands.

use std::time::Duration;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use formflow_core::error::AppError;
use formflow_entity::job::{Job, JobPriority, JobStatus};
use formflow_worker::bootstrap;

/// Arguments for queue commands
#[derive(Debug, Args)]
pub struct QueueArgs {
    /// Queue subcommand
    #[command(subcommand)]
    pub command: QueueCommand,
}

/// Queue subcommands
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Show job counts per status
    Status,
    /// Enqueue a job
    Enqueue {
        /// Job type to enqueue
        job_type: String,
        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// Priority: high, medium or low
        #[arg(long, default_value = "medium")]
        priority: JobPriority,
        /// Delay in seconds before the job becomes due
        #[arg(long, default_value_t = 0)]
        delay: u64,
    },
    /// Run one drain pass now
    Drain {
        /// Batch size (defaults to the configured value)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Purge old terminal jobs and recover stale ones
    Cleanup {
        /// Retention in days (defaults to the configured value)
        #[arg(long)]
        retention_days: Option<u32>,
        /// Staleness threshold in minutes (defaults to the configured value)
        #[arg(long)]
        stale_minutes: Option<u64>,
    },
    /// Show a single job
    Show {
        /// Job ID
        id: i64,
    },
    /// List dead-lettered jobs
    DeadLetters {
        /// Maximum number of jobs to list
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Requeue a dead-lettered job
    Retry {
        /// Job ID
        id: i64,
    },
}

/// Table row for a job
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    job_type: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Attempts")]
    attempts: String,
    #[tabled(rename = "Scheduled")]
    scheduled_at: String,
    #[tabled(rename = "Last error")]
    last_error: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        let mut last_error = job.last_error.clone().unwrap_or_default();
        if last_error.chars().count() > 60 {
            last_error = last_error.chars().take(57).collect::<String>() + "...";
        }
        Self {
            id: job.id,
            job_type: job.job_type.clone(),
            priority: job.priority.to_string(),
            status: job.status.to_string(),
            attempts: format!("{}/{}", job.attempts, job.max_attempts),
            scheduled_at: job.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            last_error,
        }
    }
}

/// Execute queue commands
pub async fn execute(
    args: &QueueArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;
    let queue = bootstrap::build_queue(&config, pool)?;

    match &args.command {
        QueueCommand::Status => {
            let stats = queue.stats().await?;
            if format == OutputFormat::Json {
                output::print_item(&stats, format);
            } else {
                println!("Job Queue Status:");
                for status in JobStatus::ALL {
                    output::print_kv(status.as_str(), stats.get(status));
                }
                output::print_kv("total", stats.total());
            }
        }
        QueueCommand::Enqueue {
            job_type,
            payload,
            priority,
            delay,
        } => {
            let payload: serde_json::Value = serde_json::from_str(payload)
                .map_err(|e| AppError::validation(format!("Invalid JSON payload: {}", e)))?;

            let id = queue
                .enqueue(job_type, &payload, *priority, Duration::from_secs(*delay))
                .await?;

            output::print_success(&format!("Job '{}' enqueued (id: {})", job_type, id));
        }
        QueueCommand::Drain { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.queue.batch_size);
            let report = queue.drain_batch(batch_size).await?;
            if format == OutputFormat::Json {
                output::print_item(&report, format);
            } else {
                println!("Drain Report:");
                output::print_kv("Selected", report.selected);
                output::print_kv("Completed", report.completed);
                output::print_kv("Retried", report.retried);
                output::print_kv("Dead-lettered", report.dead_lettered);
                output::print_kv("Skipped", report.skipped);
                output::print_kv("Errors", report.errors);
            }
        }
        QueueCommand::Cleanup {
            retention_days,
            stale_minutes,
        } => {
            let retention_days = retention_days.unwrap_or(config.queue.retention_days);
            let stale = stale_minutes
                .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
                .unwrap_or_else(|| config.queue.stale_threshold());
            let report = queue.cleanup_with(retention_days, stale).await?;
            output::print_success(&format!(
                "Cleanup complete: {} purged, {} recovered",
                report.purged, report.recovered
            ));
        }
        QueueCommand::Show { id } => {
            let job = queue.get_job(*id).await?;
            output::print_item(&job, format);
        }
        QueueCommand::DeadLetters { limit } => {
            let jobs = queue.dead_letters(*limit).await?;
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, format, "No dead-lettered jobs.");
        }
        QueueCommand::Retry { id } => {
            queue.retry_dead_letter(*id).await?;
            output::print_success(&format!("Job {} requeued", id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_job_row_shortens_long_errors() {
        let now = Utc::now();
        let job = Job {
            id: 5,
            job_type: "email_send".to_string(),
            payload: serde_json::json!({}),
            priority: JobPriority::Low,
            status: JobStatus::DeadLetter,
            attempts: 3,
            max_attempts: 3,
            last_error: Some("x".repeat(200)),
            created_at: now,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
        };

        let row = JobRow::from(&job);
        assert_eq!(row.attempts, "3/3");
        assert_eq!(row.status, "dead_letter");
        assert_eq!(row.last_error.chars().count(), 60);
        assert!(row.last_error.ends_with("..."));
    }
}
