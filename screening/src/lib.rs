//! Anti-gaming screen.
//!
//! Scores a graded submission against a set of toggleable heuristics
//! (submission velocity, collusion via shared wrong answers, implausibly fast
//! answers, perfect-score streaks on hard challenges, per-requester cooldown
//! and an optional external risk signal) and decides allow / flag / block.
//!
//! Each heuristic carries a weight that is its standalone confidence; the
//! confidences of triggered heuristics combine as a noisy-OR.

pub mod error;
pub mod history;
pub mod screen;
pub mod signal;
pub mod verdict;

pub use error::ScreeningError;
pub use history::{ActivityHistory, Cutoffs, Observation, SubmissionRecord};
pub use screen::AntiGamingScreen;
pub use signal::{ExternalSignal, HttpSignalSource, SignalSource};
pub use verdict::{combine_confidence, AntiGamingVerdict, Heuristic};
