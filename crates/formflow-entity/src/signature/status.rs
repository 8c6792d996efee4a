//! Signer state reported by the provider and the aggregated document status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated signature status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "signature_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    /// At least one signer has not acted yet.
    Pending,
    /// Every signer signed.
    Signed,
    /// At least one signer refused.
    Refused,
}

impl SignatureStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Refused => "refused",
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signer as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerStatus {
    /// Signer email address.
    pub email: String,
    /// When the signer signed, if they did.
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    /// Whether the signer refused to sign.
    #[serde(default)]
    pub refused: bool,
}

impl SignerStatus {
    /// Whether this signer has signed.
    pub fn has_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}

/// Provider view of a signature document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    /// Provider document ID.
    #[serde(default)]
    pub document_id: String,
    /// Signers in provider order.
    #[serde(default)]
    pub signers: Vec<SignerStatus>,
}

impl DocumentStatus {
    /// Fold the signer list into one status.
    ///
    /// A refusal wins over everything else. The document is signed only when
    /// the list is non-empty and every signer signed; the completion time is
    /// the latest signature.
    pub fn aggregate(&self) -> (SignatureStatus, Option<DateTime<Utc>>) {
        if self.signers.iter().any(|s| s.refused) {
            return (SignatureStatus::Refused, None);
        }

        if !self.signers.is_empty() && self.signers.iter().all(SignerStatus::has_signed) {
            let completed_at = self.signers.iter().filter_map(|s| s.signed_at).max();
            return (SignatureStatus::Signed, completed_at);
        }

        (SignatureStatus::Pending, None)
    }
}
