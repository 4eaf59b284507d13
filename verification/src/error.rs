use proofmint_types::{ChallengeId, Timestamp};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("challenge {id} expired at {expired_at}")]
    ChallengeExpired { id: ChallengeId, expired_at: Timestamp },

    #[error("challenge mismatch: {0}")]
    ChallengeMismatch(String),

    #[error("challenge {0} is already registered")]
    DuplicateChallenge(ChallengeId),

    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),
}
