//! RPC error types and their JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use proofmint_engine::EngineError;
use proofmint_verification::VerificationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Retry later with the same idempotency key.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("server error: {0}")]
    Server(String),
}

/// JSON body returned on error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl RpcError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::MetricsDisabled => "metrics_disabled",
            Self::Internal(_) | Self::Server(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::MetricsDisabled => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for RpcError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Verification(VerificationError::DuplicateChallenge(_)) => {
                RpcError::Conflict(e.to_string())
            }
            EngineError::Verification(_) | EngineError::InvalidRequest(_) => {
                RpcError::InvalidRequest(e.to_string())
            }
            EngineError::UnknownRequest(id) => RpcError::NotFound(format!("request {}", id)),
            EngineError::NotCancellable { .. } => RpcError::Conflict(e.to_string()),
            EngineError::AuditUnavailable(_) | EngineError::Store(_) | EngineError::Interrupted => {
                RpcError::Unavailable(e.to_string())
            }
            other => RpcError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofmint_types::{RequestId, RequestState};

    #[test]
    fn engine_errors_map_to_stable_statuses() {
        let id = RequestId::random();
        let cases = [
            (EngineError::UnknownRequest(id), StatusCode::NOT_FOUND, "not_found"),
            (
                EngineError::NotCancellable {
                    request_id: id,
                    state: RequestState::Minting,
                },
                StatusCode::CONFLICT,
                "conflict",
            ),
            (
                EngineError::AuditUnavailable("disk full".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
            ),
            (
                EngineError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
                "invalid_request",
            ),
            (
                EngineError::Config("bad".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (engine_error, status, code) in cases {
            let err = RpcError::from(engine_error);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }
}
