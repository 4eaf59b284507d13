use proofmint_store::StoreError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// Worth retrying: timeouts, connection failures, 5xx.
    #[error("transient settlement failure: {0}")]
    Transient(String),

    /// The rail refused the instruction (4xx); retrying inline won't help.
    #[error("settlement rejected: {0}")]
    Permanent(String),

    #[error("reconciliation store: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
