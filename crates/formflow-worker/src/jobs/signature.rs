//! Signature status polling.
//!
//! After a document is sent for signature, a `signature_status_check` job is
//! enqueued with `check_count = 0`. Each run asks the provider for the signer
//! list, stores the aggregated status when it changed, and schedules the next
//! check while the document is still pending. The polling counter travels in
//! the payload and is independent from the queue's retry attempts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing;

use formflow_core::events::SignatureEvent;
use formflow_core::result::AppResult;
use formflow_core::traits::events::EventSink;
use formflow_database::repositories::submission::SubmissionRepository;
use formflow_entity::job::JobPriority;
use formflow_entity::signature::{DocumentStatus, SignatureStatus};
use formflow_entity::submission::Submission;

use crate::executor::{JobExecutionError, JobPayload, TypedJobHandler};
use crate::producer::JobProducer;

/// Job type of the signature status poller.
pub const SIGNATURE_STATUS_JOB: &str = "signature_status_check";

/// Payload of a signature status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatusCheck {
    /// Submission whose document is tracked.
    pub submission_id: i64,
    /// Checks already performed before this one.
    #[serde(default)]
    pub check_count: u32,
}

impl SignatureStatusCheck {
    /// First check for a submission.
    pub fn first(submission_id: i64) -> Self {
        Self {
            submission_id,
            check_count: 0,
        }
    }
}

impl JobPayload for SignatureStatusCheck {
    const JOB_TYPE: &'static str = SIGNATURE_STATUS_JOB;
}

/// Read/write access to submissions needed by the poller.
#[async_trait]
pub trait SubmissionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Load a submission.
    async fn get_submission(&self, id: i64) -> AppResult<Option<Submission>>;

    /// Document ID from the signature document lookup table.
    async fn find_document_id(&self, submission_id: i64) -> AppResult<Option<String>>;

    /// Persist a new aggregated status.
    async fn update_submission_status(
        &self,
        id: i64,
        status: SignatureStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;
}

#[async_trait]
impl SubmissionStore for SubmissionRepository {
    async fn get_submission(&self, id: i64) -> AppResult<Option<Submission>> {
        self.find_by_id(id).await
    }

    async fn find_document_id(&self, submission_id: i64) -> AppResult<Option<String>> {
        SubmissionRepository::find_document_id(self, submission_id).await
    }

    async fn update_submission_status(
        &self,
        id: i64,
        status: SignatureStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        self.update_signature_status(id, status, completed_at).await
    }
}

/// Client for the e-signature provider.
#[async_trait]
pub trait SignatureProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Current signer list of a document.
    async fn get_document_status(&self, document_id: &str) -> AppResult<DocumentStatus>;
}

/// Handles `signature_status_check` jobs.
#[derive(Debug)]
pub struct SignatureStatusHandler {
    submissions: Arc<dyn SubmissionStore>,
    provider: Arc<dyn SignatureProvider>,
    producer: JobProducer,
    events: Arc<dyn EventSink>,
    poll_interval: Duration,
    max_checks: u32,
}

impl SignatureStatusHandler {
    /// Create a poller checking every `poll_interval`, at most `max_checks` times.
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        provider: Arc<dyn SignatureProvider>,
        producer: JobProducer,
        events: Arc<dyn EventSink>,
        poll_interval: Duration,
        max_checks: u32,
    ) -> Self {
        Self {
            submissions,
            provider,
            producer,
            events,
            poll_interval,
            max_checks,
        }
    }

    async fn resolve_document_id(&self, submission: &Submission) -> AppResult<Option<String>> {
        if let Some(id) = submission
            .signature_document_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
        {
            return Ok(Some(id.to_string()));
        }
        self.submissions.find_document_id(submission.id).await
    }

    /// Schedule the next check, or stop once `max_checks` checks have run.
    async fn schedule_next(&self, check: &SignatureStatusCheck) -> Result<(), JobExecutionError> {
        let next = check.check_count.saturating_add(1);
        if next >= self.max_checks {
            tracing::warn!(
                "Signature polling for submission {} stopped after {} checks",
                check.submission_id,
                next
            );
            self.events
                .emit(
                    SignatureEvent::PollingExhausted {
                        submission_id: check.submission_id,
                        checks: next,
                    }
                    .into(),
                )
                .await;
            return Ok(());
        }

        let follow_up = SignatureStatusCheck {
            submission_id: check.submission_id,
            check_count: next,
        };
        let job_id = self
            .producer
            .enqueue_payload(&follow_up, JobPriority::Medium, self.poll_interval)
            .await?;

        tracing::debug!(
            "Scheduled signature check {} for submission {} as job {}",
            next,
            check.submission_id,
            job_id
        );
        Ok(())
    }
}

#[async_trait]
impl TypedJobHandler for SignatureStatusHandler {
    type Payload = SignatureStatusCheck;

    async fn handle(&self, check: SignatureStatusCheck) -> Result<(), JobExecutionError> {
        let Some(submission) = self.submissions.get_submission(check.submission_id).await? else {
            tracing::warn!(
                "Submission {} not found, skipping signature check",
                check.submission_id
            );
            return Ok(());
        };

        let Some(document_id) = self.resolve_document_id(&submission).await? else {
            tracing::info!(
                "No signature document for submission {}, nothing to check",
                submission.id
            );
            return Ok(());
        };

        let document = self
            .provider
            .get_document_status(&document_id)
            .await
            .map_err(|e| {
                JobExecutionError::Transient(format!(
                    "Failed to fetch status of document '{}': {}",
                    document_id, e
                ))
            })?;

        let (status, completed_at) = document.aggregate();
        if submission.signature_status != Some(status) {
            self.submissions
                .update_submission_status(submission.id, status, completed_at)
                .await?;

            tracing::info!(
                "Submission {} signature status: {} -> {}",
                submission.id,
                submission
                    .signature_status
                    .map(|s| s.as_str())
                    .unwrap_or("none"),
                status
            );
            self.events
                .emit(
                    SignatureEvent::StatusChanged {
                        submission_id: submission.id,
                        document_id: document_id.clone(),
                        previous: submission.signature_status.map(|s| s.to_string()),
                        status: status.to_string(),
                        completed_at,
                    }
                    .into(),
                )
                .await;
        }

        if status == SignatureStatus::Pending {
            self.schedule_next(&check).await?;
        }

        Ok(())
    }
}
