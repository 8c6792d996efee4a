//! HTTP client for the e-signature provider.

use async_trait::async_trait;
use reqwest::StatusCode;

use formflow_core::config::SignatureConfig;
use formflow_core::error::{AppError, ErrorKind};
use formflow_core::result::AppResult;
use formflow_entity::signature::DocumentStatus;

use crate::jobs::signature::SignatureProvider;

/// Reads document status from `GET {api_base_url}/documents/{id}`.
#[derive(Debug, Clone)]
pub struct HttpSignatureProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSignatureProvider {
    /// Build a client with the configured request timeout
    pub fn new(config: &SignatureConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build signature provider client",
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn document_url(&self, document_id: &str) -> String {
        format!("{}/documents/{}", self.base_url, document_id)
    }
}

#[async_trait]
impl SignatureProvider for HttpSignatureProvider {
    async fn get_document_status(&self, document_id: &str) -> AppResult<DocumentStatus> {
        let mut request = self.client.get(self.document_url(document_id));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                "Signature provider request failed",
                e,
            )
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AppError::service_unavailable(format!(
                "Signature provider unavailable: HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            return Err(AppError::external_service(format!(
                "Signature provider returned HTTP {}: {}",
                status, body
            )));
        }

        let mut document: DocumentStatus = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                "Invalid signature provider response",
                e,
            )
        })?;
        if document.document_id.is_empty() {
            document.document_id = document_id.to_string();
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url_trims_trailing_slash() {
        let config = SignatureConfig {
            api_base_url: "https://sign.example.com/api/v1/".to_string(),
            ..SignatureConfig::default()
        };
        let provider = HttpSignatureProvider::new(&config).unwrap();
        assert_eq!(
            provider.document_url("doc-42"),
            "https://sign.example.com/api/v1/documents/doc-42"
        );
    }
}
