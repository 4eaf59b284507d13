//! Answer matching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::challenge::Question;

/// How a question's answer is compared with its expected answers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMatch {
    /// Byte-for-byte equality after trimming surrounding whitespace.
    Exact,
    /// Equality or containment after [`normalize_answer`].
    #[default]
    Fuzzy,
    /// Graded by an external [`ProofGrader`] (code, essays).
    Delegated,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GradeError {
    #[error("no grader configured for delegated question")]
    NoGrader,

    #[error("grader unavailable: {0}")]
    Unavailable(String),

    #[error("grader did not answer within {0} ms")]
    Timeout(u64),

    #[error("invalid grader response: {0}")]
    InvalidResponse(String),
}

/// External grading service for answers that can't be matched textually.
#[async_trait]
pub trait ProofGrader: Send + Sync {
    /// Whether `answer` is a correct response to `question`.
    async fn grade(&self, question: &Question, answer: &str) -> Result<bool, GradeError>;
}

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_answer(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Textual match for exact and fuzzy questions. Delegated questions never
/// match here.
pub fn matches_textually(question: &Question, answer: &str) -> bool {
    match question.matching {
        AnswerMatch::Exact => {
            let answer = answer.trim();
            question.expected.iter().any(|e| e.trim() == answer)
        }
        AnswerMatch::Fuzzy => {
            let answer = normalize_answer(answer);
            if answer.is_empty() {
                return false;
            }
            question.expected.iter().any(|e| {
                let expected = normalize_answer(e);
                !expected.is_empty() && (answer == expected || answer.contains(&expected))
            })
        }
        AnswerMatch::Delegated => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(matching: AnswerMatch, expected: &[&str]) -> Question {
        Question {
            prompt: "q".into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            matching,
        }
    }

    #[test]
    fn normalization_ignores_case_punctuation_and_spacing() {
        assert_eq!(normalize_answer("  The  Borrow-Checker! "), "the borrow checker");
    }

    #[test]
    fn exact_match_is_case_sensitive() {
        let q = question(AnswerMatch::Exact, &["Vec"]);
        assert!(matches_textually(&q, " Vec "));
        assert!(!matches_textually(&q, "vec"));
    }

    #[test]
    fn fuzzy_match_accepts_containment() {
        let q = question(AnswerMatch::Fuzzy, &["borrow checker"]);
        assert!(matches_textually(&q, "It's the Borrow Checker."));
        assert!(!matches_textually(&q, "the compiler"));
        assert!(!matches_textually(&q, "!!!"));
    }

    #[test]
    fn any_expected_answer_counts() {
        let q = question(AnswerMatch::Fuzzy, &["heap", "the heap"]);
        assert!(matches_textually(&q, "HEAP"));
    }

    #[test]
    fn delegated_never_matches_textually() {
        let q = question(AnswerMatch::Delegated, &["anything"]);
        assert!(!matches_textually(&q, "anything"));
    }
}
