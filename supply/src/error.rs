//! Supply-specific errors.

use proofmint_store::StoreError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum SupplyError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("score has no questions")]
    EmptyScore,

    #[error("arithmetic overflow in supply computation")]
    Overflow,

    #[error("supply store: {0}")]
    Store(#[from] StoreError),
}
