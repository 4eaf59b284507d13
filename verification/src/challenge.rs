//! Challenges, submissions and the registry that hands each challenge out once.

use crate::error::VerificationError;
use crate::grading::AnswerMatch;
use proofmint_types::{ChallengeId, RequesterId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Highest difficulty a challenge may carry (1..=5).
pub const MAX_DIFFICULTY: u8 = 5;

/// One question of a challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    /// Accepted answers; any one of them counts as correct.
    #[serde(default)]
    pub expected: Vec<String>,
    #[serde(default)]
    pub matching: AnswerMatch,
}

/// A knowledge challenge issued by the learning platform. Immutable once registered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofChallenge {
    pub id: ChallengeId,
    pub subject: String,
    pub questions: Vec<Question>,
    pub difficulty: u8,
    pub issued_at: Timestamp,
}

impl ProofChallenge {
    pub fn validate(&self) -> Result<(), VerificationError> {
        if !(1..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(VerificationError::InvalidChallenge(format!(
                "difficulty {} outside 1..={}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.questions.is_empty() {
            return Err(VerificationError::InvalidChallenge(
                "challenge has no questions".into(),
            ));
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.matching != AnswerMatch::Delegated && q.expected.is_empty() {
                return Err(VerificationError::InvalidChallenge(format!(
                    "question {} has no expected answers",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Instant after which the challenge can no longer be answered.
    pub fn expires_at(&self, validity_secs: u64) -> Timestamp {
        self.issued_at.saturating_add(validity_secs)
    }
}

/// A requester's answers to a challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSubmission {
    pub challenge_id: ChallengeId,
    pub requester_id: RequesterId,
    pub answers: Vec<String>,
    pub submitted_at: Timestamp,
}

struct RegisteredChallenge {
    challenge: ProofChallenge,
    consumed: bool,
}

/// Challenges awaiting an answer.
///
/// A challenge is consumed atomically by the first verification that takes
/// it; later takers get [`VerificationError::ChallengeMismatch`].
#[derive(Default)]
pub struct ChallengeRegistry {
    challenges: Mutex<HashMap<ChallengeId, RegisteredChallenge>>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, challenge: ProofChallenge) -> Result<(), VerificationError> {
        challenge.validate()?;
        let mut map = self.lock();
        if map.contains_key(&challenge.id) {
            return Err(VerificationError::DuplicateChallenge(challenge.id));
        }
        tracing::debug!(challenge = %challenge.id, difficulty = challenge.difficulty, "challenge registered");
        map.insert(
            challenge.id.clone(),
            RegisteredChallenge {
                challenge,
                consumed: false,
            },
        );
        Ok(())
    }

    /// Take the challenge for answering. Expired challenges are left in
    /// place (so a later taker sees the same error) and reported as expired.
    pub fn consume(
        &self,
        id: &ChallengeId,
        validity_secs: u64,
        now: Timestamp,
    ) -> Result<ProofChallenge, VerificationError> {
        let mut map = self.lock();
        let entry = map
            .get_mut(id)
            .ok_or_else(|| VerificationError::ChallengeMismatch(format!("unknown challenge {}", id)))?;
        if entry.consumed {
            return Err(VerificationError::ChallengeMismatch(format!(
                "challenge {} was already answered",
                id
            )));
        }
        if entry.challenge.issued_at.has_expired(validity_secs, now) {
            return Err(VerificationError::ChallengeExpired {
                id: id.clone(),
                expired_at: entry.challenge.expires_at(validity_secs),
            });
        }
        entry.consumed = true;
        Ok(entry.challenge.clone())
    }

    pub fn get(&self, id: &ChallengeId) -> Option<ProofChallenge> {
        self.lock().get(id).map(|e| e.challenge.clone())
    }

    /// Drop challenges whose validity window has passed. Returns how many were removed.
    pub fn purge_expired(&self, validity_secs: u64, now: Timestamp) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, e| !e.challenge.issued_at.has_expired(validity_secs, now));
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChallengeId, RegisteredChallenge>> {
        // The map holds no invariants a panicking writer could break halfway.
        self.challenges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
