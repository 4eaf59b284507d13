use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScreeningError {
    #[error("signal source unavailable: {0}")]
    SignalUnavailable(String),

    #[error("signal source timed out after {0}ms")]
    SignalTimeout(u64),

    #[error("signal source returned an invalid response: {0}")]
    InvalidResponse(String),
}
