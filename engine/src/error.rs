use proofmint_audit::AuditError;
use proofmint_settlement::SettlementError;
use proofmint_store::StoreError;
use proofmint_supply::SupplyError;
use proofmint_types::{RequestId, RequestState};
use proofmint_verification::VerificationError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum EngineError {
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("supply error: {0}")]
    Supply(#[from] SupplyError),

    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The terminal outcome could not be audited. Nothing is reported as
    /// final until a retry with the same key records it.
    #[error("audit log unavailable: {0}")]
    AuditUnavailable(String),

    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("request {request_id} is {state} and can no longer be cancelled")]
    NotCancellable {
        request_id: RequestId,
        state: RequestState,
    },

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: RequestState, to: RequestState },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("request processing was interrupted")]
    Interrupted,
}

impl EngineError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AuditUnavailable(_) | Self::Store(_) | Self::Interrupted
        )
    }
}
