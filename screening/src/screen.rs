//! The screen itself.

use std::sync::Arc;
use std::time::Duration;

use proofmint_types::{RequesterId, ScreeningAction, ScreeningPolicy, Timestamp, BPS_DENOMINATOR};
use proofmint_verification::{normalize_answer, VerifiedProof};

use crate::error::ScreeningError;
use crate::history::{ActivityHistory, Cutoffs, SubmissionRecord};
use crate::signal::{ExternalSignal, SignalSource};
use crate::verdict::{combine_confidence, AntiGamingVerdict, Heuristic};

pub struct AntiGamingScreen {
    policy: ScreeningPolicy,
    history: ActivityHistory,
    signal: Option<Arc<dyn SignalSource>>,
}

struct Hit {
    heuristic: Heuristic,
    weight_bps: u32,
    reason: String,
}

/// Questions are compared across requesters by subject and prompt, since
/// each challenge instance is answered only once.
fn question_key(subject: &str, prompt: &str) -> String {
    format!("{}\u{1f}{}", normalize_answer(subject), normalize_answer(prompt))
}

fn window_start(now: Timestamp, window_secs: u64) -> Timestamp {
    Timestamp::new(now.as_secs().saturating_sub(window_secs))
}

impl AntiGamingScreen {
    pub fn new(policy: ScreeningPolicy) -> Self {
        Self {
            policy,
            history: ActivityHistory::new(),
            signal: None,
        }
    }

    pub fn with_signal_source(mut self, source: Arc<dyn SignalSource>) -> Self {
        self.signal = Some(source);
        self
    }

    /// Consult the external signal source under its deadline. Runs before
    /// grading has finished, so it only needs the requester.
    pub async fn fetch_external(&self, requester: &RequesterId) -> ExternalSignal {
        let source = match (&self.signal, self.policy.external_enabled) {
            (Some(source), true) => source,
            _ => return ExternalSignal::Disabled,
        };
        let timeout_ms = self.policy.signal_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), source.risk_bps(requester)).await {
            Ok(Ok(risk)) => ExternalSignal::Risk(risk.min(BPS_DENOMINATOR)),
            Ok(Err(e)) => {
                tracing::warn!(requester = %requester, error = %e, "risk signal source failed");
                ExternalSignal::Unavailable(e.to_string())
            }
            Err(_) => {
                let e = ScreeningError::SignalTimeout(timeout_ms);
                tracing::warn!(requester = %requester, error = %e, "risk signal source timed out");
                ExternalSignal::Unavailable(e.to_string())
            }
        }
    }

    /// Run the local heuristics against a graded proof and combine them with
    /// the external signal. The submission is recorded in the history as it
    /// is read.
    pub fn assess(
        &self,
        proof: &VerifiedProof,
        external: ExternalSignal,
        received_at: Timestamp,
    ) -> AntiGamingVerdict {
        let p = &self.policy;
        let requester = &proof.submission.requester_id;
        let challenge = &proof.challenge;
        let cutoffs = Cutoffs {
            submissions: window_start(received_at, p.velocity_window_secs),
            wrong_answers: window_start(received_at, p.collusion_window_secs),
            accepted: window_start(received_at, p.cooldown_secs),
        };

        let wrong: Vec<(String, String)> = challenge
            .questions
            .iter()
            .zip(&proof.submission.answers)
            .zip(&proof.correctness)
            .filter(|(_, correct)| !**correct)
            .map(|((q, a), _)| (question_key(&challenge.subject, &q.prompt), normalize_answer(a)))
            .filter(|(_, a)| !a.is_empty())
            .collect();
        let wrong_count = wrong.len();
        let perfect = proof.score.is_perfect();
        let record = SubmissionRecord {
            at: received_at,
            difficulty: challenge.difficulty,
            perfect,
        };
        let seen = self.history.observe(requester, record, wrong, cutoffs);
        let recent = &seen.recent;

        let mut hits = Vec::new();

        if p.velocity_enabled {
            let count = recent.len() as u32 + 1;
            if count > p.max_submissions_per_window {
                hits.push(Hit {
                    heuristic: Heuristic::Velocity,
                    weight_bps: p.velocity_weight_bps,
                    reason: format!(
                        "{} submissions in {}s (max {})",
                        count, p.velocity_window_secs, p.max_submissions_per_window
                    ),
                });
            }
        }

        if p.collusion_enabled && wrong_count as u32 >= p.collusion_min_wrong && wrong_count > 0 {
            let shared = seen.shared_wrong;
            if shared as u64 * BPS_DENOMINATOR as u64
                >= p.collusion_similarity_bps as u64 * wrong_count as u64
            {
                hits.push(Hit {
                    heuristic: Heuristic::Collusion,
                    weight_bps: p.collusion_weight_bps,
                    reason: format!(
                        "{} of {} wrong answers match other requesters",
                        shared, wrong_count
                    ),
                });
            }
        }

        if p.timing_enabled {
            let min_secs = challenge.questions.len() as u64
                * challenge.difficulty as u64
                * p.min_secs_per_question_per_difficulty;
            let elapsed = challenge.issued_at.elapsed_since(received_at);
            if elapsed < min_secs {
                hits.push(Hit {
                    heuristic: Heuristic::Timing,
                    weight_bps: p.timing_weight_bps,
                    reason: format!(
                        "answered in {}s, plausible minimum {}s at difficulty {}",
                        elapsed, min_secs, challenge.difficulty
                    ),
                });
            }
        }

        if p.perfect_streak_enabled && perfect && challenge.difficulty >= p.high_difficulty {
            let streak = recent
                .iter()
                .filter(|r| r.perfect && r.difficulty >= p.high_difficulty)
                .count() as u32
                + 1;
            if streak >= p.perfect_streak_threshold {
                hits.push(Hit {
                    heuristic: Heuristic::PerfectStreak,
                    weight_bps: p.perfect_streak_weight_bps,
                    reason: format!(
                        "{} perfect scores at difficulty >= {} in {}s",
                        streak, p.high_difficulty, p.velocity_window_secs
                    ),
                });
            }
        }

        if p.cooldown_secs > 0 {
            if let Some(last) = seen.last_accepted {
                let since = last.elapsed_since(received_at);
                if since < p.cooldown_secs {
                    hits.push(Hit {
                        heuristic: Heuristic::Cooldown,
                        weight_bps: p.cooldown_weight_bps,
                        reason: format!(
                            "previous reward {}s ago, cooldown {}s",
                            since, p.cooldown_secs
                        ),
                    });
                }
            }
        }

        let mut degraded = false;
        let mut degraded_reason = None;
        match external {
            ExternalSignal::Disabled => {}
            ExternalSignal::Risk(risk) => {
                if risk >= p.external_risk_threshold_bps {
                    hits.push(Hit {
                        heuristic: Heuristic::ExternalSignal,
                        weight_bps: p.external_weight_bps,
                        reason: format!("external risk score {} bps", risk),
                    });
                }
            }
            ExternalSignal::Unavailable(e) => {
                degraded = true;
                degraded_reason = Some(format!("external signal unavailable ({}); flagged for review", e));
            }
        }

        let confidence_bps = combine_confidence(hits.iter().map(|h| h.weight_bps));
        let mut action = if confidence_bps >= p.block_threshold_bps {
            ScreeningAction::Block
        } else if confidence_bps >= p.flag_threshold_bps {
            ScreeningAction::Flag
        } else {
            ScreeningAction::Allow
        };
        if degraded && action == ScreeningAction::Allow {
            action = ScreeningAction::Flag;
        }

        let mut reasons: Vec<String> = hits
            .iter()
            .map(|h| format!("{}: {}", h.heuristic, h.reason))
            .collect();
        reasons.extend(degraded_reason);

        if action != ScreeningAction::Allow {
            tracing::info!(
                requester = %requester,
                challenge = %challenge.id,
                confidence_bps,
                ?action,
                reasons = ?reasons,
                "submission screened"
            );
        }

        AntiGamingVerdict {
            is_gaming: confidence_bps >= p.flag_threshold_bps,
            confidence_bps,
            reasons,
            action,
            triggered: hits.iter().map(|h| h.heuristic).collect(),
            degraded,
        }
    }

    /// Note an issuance that went through, for the cooldown check.
    pub fn record_accepted(&self, requester: &RequesterId, at: Timestamp) {
        self.history.record_accepted(requester, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proofmint_types::ChallengeId;
    use proofmint_verification::{AnswerMatch, ProofChallenge, ProofSubmission, Question, ScoreResult};

    /// A policy with every heuristic off, so tests switch on only what they exercise.
    fn quiet_policy() -> ScreeningPolicy {
        ScreeningPolicy {
            velocity_enabled: false,
            collusion_enabled: false,
            timing_enabled: false,
            perfect_streak_enabled: false,
            cooldown_secs: 0,
            external_enabled: false,
            ..ScreeningPolicy::default()
        }
    }

    fn proof(requester: &str, difficulty: u8, issued_at: u64, answers: &[&str], correctness: &[bool]) -> VerifiedProof {
        let questions = (0..answers.len())
            .map(|i| Question {
                prompt: format!("question {i}"),
                expected: vec!["right".into()],
                matching: AnswerMatch::Fuzzy,
            })
            .collect();
        let correct = correctness.iter().filter(|c| **c).count() as u32;
        VerifiedProof {
            challenge: ProofChallenge {
                id: ChallengeId::new(format!("c-{requester}-{issued_at}")).unwrap(),
                subject: "algebra".into(),
                questions,
                difficulty,
                issued_at: Timestamp::new(issued_at),
            },
            submission: ProofSubmission {
                challenge_id: ChallengeId::new(format!("c-{requester}-{issued_at}")).unwrap(),
                requester_id: RequesterId::new(requester).unwrap(),
                answers: answers.iter().map(|s| s.to_string()).collect(),
                submitted_at: Timestamp::new(issued_at),
            },
            score: ScoreResult::new(correct, correctness.len() as u32, 0, 7_000),
            correctness: correctness.to_vec(),
        }
    }

    #[test]
    fn clean_submission_is_allowed() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            external_enabled: false,
            ..ScreeningPolicy::default()
        });
        let verdict = screen.assess(
            &proof("alice", 2, 0, &["right", "right"], &[true, true]),
            ExternalSignal::Disabled,
            Timestamp::new(600),
        );
        assert_eq!(verdict.action, ScreeningAction::Allow);
        assert!(!verdict.is_gaming);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn velocity_flags_the_eleventh_submission() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            velocity_enabled: true,
            ..quiet_policy()
        });
        for i in 0..10 {
            let v = screen.assess(
                &proof("alice", 1, i, &["right"], &[true]),
                ExternalSignal::Disabled,
                Timestamp::new(1_000 + i),
            );
            assert_eq!(v.action, ScreeningAction::Allow, "submission {i}");
        }
        let v = screen.assess(
            &proof("alice", 1, 10, &["right"], &[true]),
            ExternalSignal::Disabled,
            Timestamp::new(1_010),
        );
        assert_eq!(v.action, ScreeningAction::Flag);
        assert_eq!(v.triggered, vec![Heuristic::Velocity]);
    }

    #[test]
    fn simultaneous_submissions_from_one_requester_are_all_counted() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            velocity_enabled: true,
            ..quiet_policy()
        });

        let flagged = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..32)
                .map(|i| {
                    let screen = &screen;
                    scope.spawn(move || {
                        screen
                            .assess(
                                &proof("alice", 1, i, &["right"], &[true]),
                                ExternalSignal::Disabled,
                                Timestamp::new(1_000),
                            )
                            .action
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|action| *action == ScreeningAction::Flag)
                .count()
        });

        assert_eq!(flagged, 22);
    }

    #[test]
    fn fast_answers_are_flagged() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            timing_enabled: true,
            ..quiet_policy()
        });
        // 2 questions × difficulty 4 × 3s = 24s minimum.
        let v = screen.assess(
            &proof("alice", 4, 100, &["right", "right"], &[true, true]),
            ExternalSignal::Disabled,
            Timestamp::new(110),
        );
        assert_eq!(v.triggered, vec![Heuristic::Timing]);
        assert_eq!(v.action, ScreeningAction::Flag);

        let v = screen.assess(
            &proof("bob", 4, 100, &["right", "right"], &[true, true]),
            ExternalSignal::Disabled,
            Timestamp::new(124),
        );
        assert_eq!(v.action, ScreeningAction::Allow);
    }

    #[test]
    fn shared_wrong_answers_plus_speed_block() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            collusion_enabled: true,
            timing_enabled: true,
            ..quiet_policy()
        });
        let answers = ["wrong a", "wrong b", "right"];
        let correctness = [false, false, true];

        let first = screen.assess(
            &proof("alice", 1, 0, &answers, &correctness),
            ExternalSignal::Disabled,
            Timestamp::new(100),
        );
        assert_eq!(first.action, ScreeningAction::Allow);

        let second = screen.assess(
            &proof("bob", 1, 100, &answers, &correctness),
            ExternalSignal::Disabled,
            Timestamp::new(102),
        );
        assert!(second.triggered.contains(&Heuristic::Collusion));
        assert!(second.triggered.contains(&Heuristic::Timing));
        assert_eq!(second.action, ScreeningAction::Block);
        assert!(second.confidence_bps >= 7_500);
    }

    #[test]
    fn perfect_streak_on_hard_challenges() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            perfect_streak_enabled: true,
            ..quiet_policy()
        });
        for i in 0..2 {
            let v = screen.assess(
                &proof("alice", 5, i, &["right"], &[true]),
                ExternalSignal::Disabled,
                Timestamp::new(500 + i),
            );
            assert_eq!(v.action, ScreeningAction::Allow);
        }
        let v = screen.assess(
            &proof("alice", 5, 2, &["right"], &[true]),
            ExternalSignal::Disabled,
            Timestamp::new(502),
        );
        assert_eq!(v.triggered, vec![Heuristic::PerfectStreak]);
    }

    #[test]
    fn cooldown_flags_rapid_rewards() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            cooldown_secs: 60,
            ..quiet_policy()
        });
        let alice = RequesterId::new("alice").unwrap();
        screen.record_accepted(&alice, Timestamp::new(1_000));

        let v = screen.assess(
            &proof("alice", 1, 1_000, &["right"], &[true]),
            ExternalSignal::Disabled,
            Timestamp::new(1_030),
        );
        assert_eq!(v.triggered, vec![Heuristic::Cooldown]);
        assert_eq!(v.action, ScreeningAction::Flag);
    }

    #[test]
    fn unreachable_signal_degrades_to_flag_not_block() {
        let screen = AntiGamingScreen::new(quiet_policy());
        let v = screen.assess(
            &proof("alice", 1, 0, &["right"], &[true]),
            ExternalSignal::Unavailable("connection refused".into()),
            Timestamp::new(100),
        );
        assert_eq!(v.action, ScreeningAction::Flag);
        assert!(v.degraded);
        assert!(!v.is_gaming);
        assert!(v.reasons[0].contains("external signal unavailable"));
    }

    #[test]
    fn high_external_risk_triggers() {
        let screen = AntiGamingScreen::new(quiet_policy());
        let v = screen.assess(
            &proof("alice", 1, 0, &["right"], &[true]),
            ExternalSignal::Risk(9_000),
            Timestamp::new(100),
        );
        assert_eq!(v.triggered, vec![Heuristic::ExternalSignal]);
        assert_eq!(v.action, ScreeningAction::Flag);
    }

    struct SlowSource;

    #[async_trait]
    impl SignalSource for SlowSource {
        async fn risk_bps(&self, _requester: &RequesterId) -> Result<u32, ScreeningError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_signal_times_out_as_unavailable() {
        let screen = AntiGamingScreen::new(ScreeningPolicy {
            external_enabled: true,
            ..quiet_policy()
        })
        .with_signal_source(Arc::new(SlowSource));

        let signal = screen.fetch_external(&RequesterId::new("alice").unwrap()).await;
        assert!(matches!(signal, ExternalSignal::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_source_is_disabled() {
        let screen = AntiGamingScreen::new(ScreeningPolicy::default());
        let signal = screen.fetch_external(&RequesterId::new("alice").unwrap()).await;
        assert_eq!(signal, ExternalSignal::Disabled);
    }
}
