//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod queue;
pub mod scheduler;
pub mod signature;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::queue::QueueConfig;
pub use self::scheduler::SchedulerConfig;
pub use self::signature::SignatureConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Job queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// E-signature provider and polling settings.
    #[serde(default)]
    pub signature: SignatureConfig,
    /// Periodic trigger settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file at `path` is merged with an optional overlay named after the
    /// `FORMFLOW_ENV` environment variable (`config/{env}.toml`) and with
    /// environment variables prefixed with `FORMFLOW__`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let env = std::env::var("FORMFLOW_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FORMFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(document: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://formflow@localhost/formflow"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.batch_size, 10);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.base_delay_seconds, 60);
        assert_eq!(config.queue.retention_days, 30);
        assert_eq!(config.queue.max_error_bytes, queue::MAX_ERROR_BYTES);
        assert_eq!(config.signature.poll_interval_seconds, 300);
        assert_eq!(config.signature.max_checks, 288);
        assert_eq!(config.scheduler.drain_cron, "0 */5 * * * *");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "postgres://localhost/formflow"

            [queue]
            batch_size = 25
            max_attempts = 5
            stale_after_minutes = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.batch_size, 25);
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.queue.stale_threshold().as_secs(), 900);
        assert_eq!(config.queue.base_delay_seconds, 60);
    }

    #[test]
    fn test_missing_database_is_rejected() {
        let result = AppConfig::from_toml("[queue]\nbatch_size = 5\n");
        assert!(result.is_err());
    }
}
