//! External risk signals.

use async_trait::async_trait;
use proofmint_types::{RequesterId, BPS_DENOMINATOR};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ScreeningError;

/// A third-party fraud/risk signal about a requester.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Risk score for the requester in basis points (0 = none, 10000 = certain).
    async fn risk_bps(&self, requester: &RequesterId) -> Result<u32, ScreeningError>;
}

/// What the external source said for one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalSignal {
    /// No source configured or the heuristic is switched off.
    Disabled,
    Risk(u32),
    /// The source failed or timed out; screening degrades to at least `Flag`.
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalResponse {
    /// Risk in [0, 1].
    risk_score: f64,
}

/// HTTP client for a risk-signal service: `GET {base}/v1/signals/{requesterId}`
/// returning `{"riskScore": 0.0..1.0}`.
pub struct HttpSignalSource {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSignalSource {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    async fn risk_bps(&self, requester: &RequesterId) -> Result<u32, ScreeningError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ScreeningError::SignalUnavailable(format!("bad base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ScreeningError::SignalUnavailable("base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["v1", "signals", requester.as_str()]);

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ScreeningError::SignalUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ScreeningError::SignalUnavailable(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        let body: SignalResponse = resp
            .json()
            .await
            .map_err(|e| ScreeningError::InvalidResponse(e.to_string()))?;
        if !(0.0..=1.0).contains(&body.risk_score) {
            return Err(ScreeningError::InvalidResponse(format!(
                "risk score {} outside [0, 1]",
                body.risk_score
            )));
        }
        Ok((body.risk_score * BPS_DENOMINATOR as f64).round() as u32)
    }
}
