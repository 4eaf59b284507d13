//! Errors for parsing identifiers and validating policy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("idempotency key must be a UUID, got {0:?}")]
    InvalidRequestId(String),

    #[error("invalid {kind} id: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("invalid hash hex: {0:?}")]
    InvalidHash(String),

    #[error("invalid issuance policy: {0}")]
    InvalidPolicy(String),
}
