//! Proof verification.
//!
//! The learning platform registers a [`ProofChallenge`]; a requester answers
//! it with a [`ProofSubmission`]. The [`ProofVerifier`] consumes the challenge
//! (each challenge is answerable once), checks its validity window, grades
//! every answer and produces a [`ScoreResult`].
//!
//! Answer matching is per question: exact, fuzzy (normalised equality or
//! containment) or delegated to an external [`ProofGrader`] for code and
//! essay answers, e.g. the [`HttpProofGrader`]. Every grader call runs under
//! a deadline.

pub mod challenge;
pub mod error;
pub mod grading;
pub mod remote;
pub mod verifier;

pub use challenge::{ChallengeRegistry, ProofChallenge, ProofSubmission, Question, MAX_DIFFICULTY};
pub use error::VerificationError;
pub use grading::{matches_textually, normalize_answer, AnswerMatch, GradeError, ProofGrader};
pub use remote::HttpProofGrader;
pub use verifier::{ProofVerifier, ScoreResult, VerifiedProof};
