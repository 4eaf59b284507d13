//! The settlement rail and its HTTP client.

use async_trait::async_trait;
use proofmint_types::{RequestId, RequesterId, TokenAmount};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SettlementError;

/// What the rail is asked to mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintInstruction {
    pub request_id: RequestId,
    pub requester_id: RequesterId,
    pub amount: TokenAmount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub tx_id: String,
}

/// External settlement rail. Must be idempotent by `request_id`: submitting
/// the same instruction twice settles once and returns the same receipt.
#[async_trait]
pub trait SettlementRail: Send + Sync {
    async fn submit_mint(&self, instruction: &MintInstruction) -> Result<SettlementReceipt, SettlementError>;
}

/// HTTP client for the rail: `POST {base}/v1/mints` with an
/// `Idempotency-Key` header carrying the request id.
pub struct HttpSettlementRail {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSettlementRail {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl SettlementRail for HttpSettlementRail {
    async fn submit_mint(&self, instruction: &MintInstruction) -> Result<SettlementReceipt, SettlementError> {
        let url = format!("{}/v1/mints", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Idempotency-Key", instruction.request_id.to_string())
            .json(instruction)
            .send()
            .await
            .map_err(|e| SettlementError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SettlementError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SettlementError::Permanent(format!("HTTP {}: {}", status, body)));
        }

        // The rail may have settled even if we can't read its answer; a retry
        // with the same key returns the receipt.
        resp.json()
            .await
            .map_err(|e| SettlementError::Transient(format!("unreadable receipt: {e}")))
    }
}
