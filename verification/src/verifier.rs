//! The proof verifier: consume, check, grade, score.

use std::sync::Arc;
use std::time::Duration;

use proofmint_types::{Clock, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

use crate::challenge::{ChallengeRegistry, ProofChallenge, ProofSubmission};
use crate::error::VerificationError;
use crate::grading::{matches_textually, AnswerMatch, GradeError, ProofGrader};

/// Outcome of grading one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub correct_count: u32,
    pub total_count: u32,
    /// Delegated answers the grader could not assess (counted as incorrect).
    pub grading_errors: u32,
    /// `correct / total >= pass threshold`.
    pub valid: bool,
}

impl ScoreResult {
    /// Score a count of correct answers against an exact threshold.
    pub fn new(correct_count: u32, total_count: u32, grading_errors: u32, pass_threshold_bps: u32) -> Self {
        // correct/total >= threshold/10000, cross-multiplied to stay exact.
        let valid = total_count > 0
            && correct_count as u64 * BPS_DENOMINATOR as u64
                >= pass_threshold_bps as u64 * total_count as u64;
        Self {
            correct_count,
            total_count,
            grading_errors,
            valid,
        }
    }

    /// `correct / total` in [0, 1].
    pub fn normalized_score(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.correct_count as f64 / self.total_count as f64
    }

    /// Normalized score in basis points, floored.
    pub fn score_bps(&self) -> u32 {
        if self.total_count == 0 {
            return 0;
        }
        (self.correct_count as u64 * BPS_DENOMINATOR as u64 / self.total_count as u64) as u32
    }

    pub fn is_perfect(&self) -> bool {
        self.total_count > 0 && self.correct_count == self.total_count
    }
}

/// A graded submission together with the challenge it answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProof {
    pub challenge: ProofChallenge,
    pub submission: ProofSubmission,
    pub score: ScoreResult,
    /// Per-question correctness, in question order.
    pub correctness: Vec<bool>,
}

pub struct ProofVerifier {
    registry: Arc<ChallengeRegistry>,
    clock: Arc<dyn Clock>,
    grader: Option<Arc<dyn ProofGrader>>,
    grading_timeout: Duration,
    pass_threshold_bps: u32,
    validity_secs: u64,
}

impl ProofVerifier {
    pub fn new(
        registry: Arc<ChallengeRegistry>,
        clock: Arc<dyn Clock>,
        pass_threshold_bps: u32,
        validity_secs: u64,
    ) -> Self {
        Self {
            registry,
            clock,
            grader: None,
            grading_timeout: Duration::from_secs(5),
            pass_threshold_bps,
            validity_secs,
        }
    }

    /// Attach an external grader for delegated questions. Each call gets
    /// `timeout`; a call that runs over counts as a grading error.
    pub fn with_grader(mut self, grader: Arc<dyn ProofGrader>, timeout: Duration) -> Self {
        self.grader = Some(grader);
        self.grading_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ChallengeRegistry> {
        &self.registry
    }

    /// Verify a submission.
    ///
    /// Consumes the challenge on success *and* on a below-threshold score;
    /// a submission with the wrong number of answers is rejected before the
    /// challenge is consumed.
    pub async fn verify(&self, submission: &ProofSubmission) -> Result<VerifiedProof, VerificationError> {
        let id = &submission.challenge_id;
        let preview = self
            .registry
            .get(id)
            .ok_or_else(|| VerificationError::ChallengeMismatch(format!("unknown challenge {}", id)))?;
        if preview.questions.len() != submission.answers.len() {
            return Err(VerificationError::ChallengeMismatch(format!(
                "challenge {} has {} questions, submission has {} answers",
                id,
                preview.questions.len(),
                submission.answers.len()
            )));
        }

        let challenge = self.registry.consume(id, self.validity_secs, self.clock.now())?;

        let mut correctness = Vec::with_capacity(challenge.questions.len());
        let mut grading_errors = 0u32;
        for (question, answer) in challenge.questions.iter().zip(&submission.answers) {
            let correct = match question.matching {
                AnswerMatch::Delegated => match self.grade_delegated(question, answer).await {
                    Ok(ok) => ok,
                    Err(e) => {
                        tracing::warn!(challenge = %id, error = %e, "delegated grading failed, counting answer as incorrect");
                        grading_errors += 1;
                        false
                    }
                },
                _ => matches_textually(question, answer),
            };
            correctness.push(correct);
        }

        let correct_count = correctness.iter().filter(|c| **c).count() as u32;
        let score = ScoreResult::new(
            correct_count,
            correctness.len() as u32,
            grading_errors,
            self.pass_threshold_bps,
        );
        tracing::debug!(
            challenge = %id,
            requester = %submission.requester_id,
            correct = score.correct_count,
            total = score.total_count,
            score = score.normalized_score(),
            valid = score.valid,
            "proof graded"
        );

        Ok(VerifiedProof {
            challenge,
            submission: submission.clone(),
            score,
            correctness,
        })
    }

    async fn grade_delegated(
        &self,
        question: &crate::challenge::Question,
        answer: &str,
    ) -> Result<bool, GradeError> {
        let grader = self.grader.as_ref().ok_or(GradeError::NoGrader)?;
        tokio::time::timeout(self.grading_timeout, grader.grade(question, answer))
            .await
            .map_err(|_| GradeError::Timeout(self.grading_timeout.as_millis() as u64))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::tests::challenge;
    use crate::challenge::Question;
    use async_trait::async_trait;
    use proofmint_types::{ChallengeId, RequesterId, Timestamp};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(AtomicU64);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.load(Ordering::SeqCst))
        }
    }

    struct LengthGrader;

    #[async_trait]
    impl ProofGrader for LengthGrader {
        async fn grade(&self, _question: &Question, answer: &str) -> Result<bool, GradeError> {
            if answer == "crash" {
                return Err(GradeError::Unavailable("grader down".into()));
            }
            if answer == "hang" {
                std::future::pending::<()>().await;
            }
            Ok(answer.len() >= 10)
        }
    }

    fn verifier_at(now: u64) -> ProofVerifier {
        ProofVerifier::new(
            Arc::new(ChallengeRegistry::new()),
            Arc::new(FixedClock(AtomicU64::new(now))),
            7_000,
            3_600,
        )
    }

    fn submission(id: &str, answers: &[&str]) -> ProofSubmission {
        ProofSubmission {
            challenge_id: ChallengeId::new(id).unwrap(),
            requester_id: RequesterId::new("learner-1").unwrap(),
            answers: answers.iter().map(|s| s.to_string()).collect(),
            submitted_at: Timestamp::new(10),
        }
    }

    #[test]
    fn threshold_comparison_is_exact() {
        assert!(ScoreResult::new(7, 10, 0, 7_000).valid);
        assert!(!ScoreResult::new(69, 100, 0, 7_000).valid);
        assert!(!ScoreResult::new(0, 0, 0, 0).valid);
        assert_eq!(ScoreResult::new(2, 3, 0, 7_000).score_bps(), 6_666);
    }

    #[tokio::test]
    async fn all_correct_is_valid_and_perfect() {
        let verifier = verifier_at(100);
        verifier.registry().register(challenge("c1", 3, 50)).unwrap();

        let proof = verifier
            .verify(&submission("c1", &["It is THE receiver.", "&"]))
            .await
            .unwrap();

        assert!(proof.score.valid);
        assert!(proof.score.is_perfect());
        assert_eq!(proof.correctness, vec![true, true]);
    }

    #[tokio::test]
    async fn half_correct_is_below_threshold() {
        let verifier = verifier_at(100);
        verifier.registry().register(challenge("c1", 3, 50)).unwrap();

        let proof = verifier.verify(&submission("c1", &["the receiver", "&mut"])).await.unwrap();

        assert_eq!(proof.score.correct_count, 1);
        assert!(!proof.score.valid);
    }

    #[tokio::test]
    async fn wrong_answer_count_does_not_consume() {
        let verifier = verifier_at(100);
        verifier.registry().register(challenge("c1", 3, 50)).unwrap();

        let err = verifier.verify(&submission("c1", &["only one"])).await.unwrap_err();
        assert!(matches!(err, VerificationError::ChallengeMismatch(_)));

        // Still answerable.
        verifier.verify(&submission("c1", &["the receiver", "&"])).await.unwrap();
    }

    #[tokio::test]
    async fn expired_challenge_is_rejected() {
        let verifier = verifier_at(50 + 3_601);
        verifier.registry().register(challenge("c1", 3, 50)).unwrap();

        let err = verifier.verify(&submission("c1", &["the receiver", "&"])).await.unwrap_err();
        assert!(matches!(err, VerificationError::ChallengeExpired { .. }));
    }

    #[tokio::test]
    async fn delegated_questions_use_the_grader() {
        let verifier = verifier_at(100).with_grader(Arc::new(LengthGrader), Duration::from_secs(1));
        let mut c = challenge("essay", 4, 50);
        c.questions = vec![
            Question {
                prompt: "Explain lifetimes".into(),
                expected: vec![],
                matching: AnswerMatch::Delegated,
            },
            Question {
                prompt: "Explain traits".into(),
                expected: vec![],
                matching: AnswerMatch::Delegated,
            },
        ];
        verifier.registry().register(c).unwrap();

        let proof = verifier
            .verify(&submission("essay", &["references must not outlive data", "crash"]))
            .await
            .unwrap();

        assert_eq!(proof.score.correct_count, 1);
        assert_eq!(proof.score.grading_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_grader_times_out_as_a_grading_error() {
        let verifier = verifier_at(100).with_grader(Arc::new(LengthGrader), Duration::from_millis(250));
        let mut c = challenge("essay", 2, 50);
        c.questions[0].matching = AnswerMatch::Delegated;
        verifier.registry().register(c).unwrap();

        let proof = verifier.verify(&submission("essay", &["hang", "&"])).await.unwrap();

        assert_eq!(proof.correctness, vec![false, true]);
        assert_eq!(proof.score.grading_errors, 1);
        assert!(!proof.score.valid);
    }

    #[tokio::test]
    async fn delegated_without_grader_counts_as_error() {
        let verifier = verifier_at(100);
        let mut c = challenge("essay", 2, 50);
        c.questions[0].matching = AnswerMatch::Delegated;
        verifier.registry().register(c).unwrap();

        let proof = verifier.verify(&submission("essay", &["anything", "&"])).await.unwrap();
        assert_eq!(proof.score.grading_errors, 1);
        assert_eq!(proof.score.correct_count, 1);
    }
}
