//! E-signature workflow domain events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events raised by the signature-status poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignatureEvent {
    /// The aggregated signer status of a submission changed.
    StatusChanged {
        /// Submission ID.
        submission_id: i64,
        /// Provider document ID.
        document_id: String,
        /// Previously stored status, if any.
        previous: Option<String>,
        /// New status.
        status: String,
        /// Completion time when the document is fully signed.
        completed_at: Option<DateTime<Utc>>,
    },
    /// Polling stopped after the maximum number of checks.
    PollingExhausted {
        /// Submission ID.
        submission_id: i64,
        /// Checks performed.
        checks: u32,
    },
}

impl SignatureEvent {
    /// Dotted event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "signature.status_changed",
            Self::PollingExhausted { .. } => "signature.polling_exhausted",
        }
    }
}
