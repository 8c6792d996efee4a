//! E-signature provider and status polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the e-signature provider client and the status poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Base URL of the provider's REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Delay between two status checks of the same submission, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Number of checks after which polling gives up (288 × 5 min = 24 h).
    #[serde(default = "default_max_checks")]
    pub max_checks: u32,
}

impl SignatureConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            request_timeout_seconds: default_request_timeout(),
            poll_interval_seconds: default_poll_interval(),
            max_checks: default_max_checks(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8900/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_checks() -> u32 {
    288
}
