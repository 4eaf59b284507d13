use proofmint_store::StoreError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum AuditError {
    #[error("audit store: {0}")]
    Store(#[from] StoreError),

    #[error("audit chain broken at sequence {sequence}: {reason}")]
    ChainBroken { sequence: u64, reason: String },
}
