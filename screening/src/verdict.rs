use proofmint_types::{ScreeningAction, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The behavioural checks the screen can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    Velocity,
    Collusion,
    Timing,
    PerfectStreak,
    Cooldown,
    ExternalSignal,
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Velocity => "velocity",
            Self::Collusion => "collusion",
            Self::Timing => "timing",
            Self::PerfectStreak => "perfect_streak",
            Self::Cooldown => "cooldown",
            Self::ExternalSignal => "external_signal",
        };
        f.write_str(s)
    }
}

/// Outcome of screening one submission. `Block` is binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiGamingVerdict {
    pub is_gaming: bool,
    /// Combined confidence in basis points.
    pub confidence_bps: u32,
    pub reasons: Vec<String>,
    pub action: ScreeningAction,
    pub triggered: Vec<Heuristic>,
    /// An external source could not be consulted; the action is at least `Flag`.
    pub degraded: bool,
}

impl AntiGamingVerdict {
    pub fn allow() -> Self {
        Self {
            is_gaming: false,
            confidence_bps: 0,
            reasons: Vec::new(),
            action: ScreeningAction::Allow,
            triggered: Vec::new(),
            degraded: false,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence_bps as f64 / BPS_DENOMINATOR as f64
    }

    pub fn requires_review(&self) -> bool {
        self.action == ScreeningAction::Flag
    }
}

/// Noisy-OR of standalone confidences: `1 - Π(1 - w_i)`, in basis points.
pub fn combine_confidence(weights_bps: impl IntoIterator<Item = u32>) -> u32 {
    let denom = BPS_DENOMINATOR as u64;
    let mut remaining = denom;
    for w in weights_bps {
        let w = (w as u64).min(denom);
        remaining = remaining * (denom - w) / denom;
    }
    (denom - remaining) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_signals_means_zero_confidence() {
        assert_eq!(combine_confidence([]), 0);
    }

    #[test]
    fn single_signal_keeps_its_weight() {
        assert_eq!(combine_confidence([4_000]), 4_000);
    }

    #[test]
    fn signals_reinforce_without_exceeding_one() {
        // 1 - 0.6 * 0.55 = 0.67
        assert_eq!(combine_confidence([4_000, 4_500]), 6_700);
        assert_eq!(combine_confidence([10_000, 3_000]), 10_000);
        assert_eq!(combine_confidence([9_000; 8]), 10_000);
    }
}
