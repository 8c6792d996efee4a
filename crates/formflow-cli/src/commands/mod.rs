//! CLI command definitions and dispatch.

pub mod migrate;
pub mod queue;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use formflow_core::config::AppConfig;
use formflow_core::error::AppError;

/// Formflow job queue administration
#[derive(Debug, Parser)]
#[command(name = "formflow", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log queue activity to stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Job queue inspection and maintenance
    Queue(queue::QueueArgs),
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &self.config).await,
            Commands::Queue(args) => queue::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
        .map_err(|e| AppError::configuration(format!("Failed to load config: {}", e)))
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<sqlx::PgPool, AppError> {
    let pool = formflow_database::connection::DatabasePool::connect(&config.database).await?;
    Ok(pool.into_pool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_enqueue_with_priority_and_delay() {
        let cli = Cli::try_parse_from([
            "formflow",
            "queue",
            "enqueue",
            "email_send",
            "--payload",
            r#"{"to":"a@example.com"}"#,
            "--priority",
            "high",
            "--delay",
            "90",
        ])
        .unwrap();

        match cli.command {
            Commands::Queue(queue::QueueArgs {
                command:
                    queue::QueueCommand::Enqueue {
                        job_type,
                        priority,
                        delay,
                        ..
                    },
            }) => {
                assert_eq!(job_type, "email_send");
                assert_eq!(priority, formflow_entity::job::JobPriority::High);
                assert_eq!(delay, 90);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_verbose_flag_raises_log_level() {
        let quiet = Cli::try_parse_from(["formflow", "queue", "status"]).unwrap();
        assert_eq!(quiet.log_level(), "warn");

        let loud = Cli::try_parse_from(["formflow", "queue", "drain", "-vv"]).unwrap();
        assert_eq!(loud.log_level(), "debug");
    }

    #[test]
    fn test_rejects_unknown_priority() {
        let parsed = Cli::try_parse_from(["formflow", "queue", "enqueue", "x", "--priority", "urgent"]);
        assert!(parsed.is_err());
    }
}
