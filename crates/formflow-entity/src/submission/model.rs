//! Submission entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::signature::SignatureStatus;

/// A stored form submission, reduced to the fields the signature workflow reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    /// Submission ID.
    pub id: i64,
    /// Form the submission belongs to.
    pub form_id: i64,
    /// Aggregated signature status, once a document was sent for signature.
    pub signature_status: Option<SignatureStatus>,
    /// Provider document ID, when recorded on the submission itself.
    pub signature_document_id: Option<String>,
    /// When every signer had signed.
    pub signature_completed_at: Option<DateTime<Utc>>,
    /// When the submission was created.
    pub created_at: DateTime<Utc>,
    /// When the submission was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A row of the signature document lookup table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SignatureDocument {
    /// Row ID.
    pub id: i64,
    /// Submission the document was created for.
    pub submission_id: i64,
    /// Provider document ID.
    pub document_id: String,
    /// When the document was sent for signature.
    pub created_at: DateTime<Utc>,
}
