//! The external compliance authority and its HTTP client.

use async_trait::async_trait;
use proofmint_types::{ComplianceStatus, RequesterId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ComplianceError;

/// What the authority answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityResponse {
    pub status: ComplianceStatus,
    #[serde(default)]
    pub log_id: Option<String>,
}

/// A KYC/AML provider.
#[async_trait]
pub trait ComplianceAuthority: Send + Sync {
    async fn check(&self, requester: &RequesterId) -> Result<AuthorityResponse, ComplianceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    requester_id: &'a str,
}

/// HTTP client for the authority: `POST {base}/v1/compliance/check` with
/// `{"requesterId"}`, answered by `{"status","logId"}`.
pub struct HttpComplianceAuthority {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpComplianceAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ComplianceAuthority for HttpComplianceAuthority {
    async fn check(&self, requester: &RequesterId) -> Result<AuthorityResponse, ComplianceError> {
        let url = format!("{}/v1/compliance/check", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&CheckRequest {
                requester_id: requester.as_str(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ComplianceError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    ComplianceError::Unavailable(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(ComplianceError::Unavailable(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ComplianceError::InvalidResponse(e.to_string()))
    }
}
