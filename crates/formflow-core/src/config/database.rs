//! `[database]` section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pool settings for the PostgreSQL database holding `form_jobs` and the
/// submission tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connections kept open while the queue is idle.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// How long a drain waits for a free connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Acquire timeout for the pool.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Idle timeout for the pool.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// `min_connections` clamped to `max_connections`.
    pub fn effective_min_connections(&self) -> u32 {
        self.min_connections.min(self.max_connections)
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_connections_never_exceeds_max() {
        let config = DatabaseConfig {
            url: "postgres://localhost/formflow".to_string(),
            max_connections: 2,
            min_connections: 8,
            connect_timeout_seconds: 5,
            idle_timeout_seconds: 60,
        };
        assert_eq!(config.effective_min_connections(), 2);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }
}
