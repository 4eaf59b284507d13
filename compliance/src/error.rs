use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("compliance authority unavailable: {0}")]
    Unavailable(String),

    #[error("compliance authority timed out after {0}ms")]
    Timeout(u64),

    #[error("compliance authority returned an invalid response: {0}")]
    InvalidResponse(String),
}
