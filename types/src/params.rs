//! Issuance policy: every tunable that governs verification, rewards,
//! supply, compliance, settlement and anti-gaming screening.
//!
//! Ratios and multipliers are basis points (10_000 = 1.0) so reward
//! arithmetic stays in integers.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// Basis-point denominator (10_000 = 100%).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Score-multiplier tier: scores at or above `min_score_bps` earn `multiplier_bps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTier {
    pub min_score_bps: u32,
    pub multiplier_bps: u32,
}

/// Staking lock tier: a lock of at least `min_lock_days` earns `multiplier_bps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTier {
    pub min_lock_days: u32,
    pub multiplier_bps: u32,
}

/// All issuance parameters held by the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuancePolicy {
    // ── Proof verification ──────────────────────────────────────────────
    /// Minimum normalized score for a proof to be valid (7000 = 0.70).
    pub pass_threshold_bps: u32,

    /// Seconds a challenge stays answerable after it was issued.
    pub challenge_validity_secs: u64,

    /// Deadline for one external grader call (milliseconds).
    pub grading_timeout_ms: u64,

    // ── Reward ──────────────────────────────────────────────────────────
    /// Reward for a perfect score at rate 1.0, before bonuses (units).
    /// TOML integers are 64-bit, so policy amounts are too.
    pub base_amount: u64,

    /// Issuance rate before any halving (10_000 = 1.0).
    pub initial_rate_bps: u32,

    /// Bonus per requester level (basis points, additive).
    pub level_bonus_bps_per_level: u32,

    /// Upper bound on the level bonus.
    pub max_level_bonus_bps: u32,

    /// Score-multiplier tiers; the highest matching tier applies.
    pub score_tiers: Vec<ScoreTier>,

    /// Staking lock tiers; the longest matching lock applies.
    pub stake_tiers: Vec<StakeTier>,

    /// UBI multiplier applied to every reward (10_000 = 1.0).
    pub ubi_rate_bps: u32,

    // ── Supply ──────────────────────────────────────────────────────────
    /// Hard supply cap (units).
    pub max_supply: u64,

    /// Accepted issuances between halvings.
    pub halving_interval: u64,

    /// Times a reward is re-priced when a halving lands between pricing and commit.
    pub max_reprice_attempts: u32,

    // ── Compliance ──────────────────────────────────────────────────────
    /// Deadline for a compliance authority call (milliseconds).
    pub compliance_timeout_ms: u64,

    /// How long an `approved` verdict is reused (seconds).
    pub compliance_cache_ttl_secs: u64,

    // ── Settlement ──────────────────────────────────────────────────────
    /// Inline settlement attempts before handing over to reconciliation.
    pub mint_max_attempts: u32,

    /// First retry delay (milliseconds); doubles per attempt.
    pub mint_backoff_base_ms: u64,

    /// Retry delay ceiling (milliseconds).
    pub mint_backoff_max_ms: u64,

    // ── Anti-gaming ─────────────────────────────────────────────────────
    pub screening: ScreeningPolicy,
}

impl IssuancePolicy {
    /// Production defaults.
    pub fn standard() -> Self {
        Self {
            pass_threshold_bps: 7_000,
            challenge_validity_secs: 3_600,
            grading_timeout_ms: 5_000,

            base_amount: 10,
            initial_rate_bps: BPS_DENOMINATOR,
            level_bonus_bps_per_level: 500,
            max_level_bonus_bps: 2_500,
            score_tiers: vec![ScoreTier {
                min_score_bps: 9_000,
                multiplier_bps: 15_000,
            }],
            stake_tiers: vec![
                StakeTier {
                    min_lock_days: 30,
                    multiplier_bps: 12_000,
                },
                StakeTier {
                    min_lock_days: 90,
                    multiplier_bps: 15_000,
                },
                StakeTier {
                    min_lock_days: 365,
                    multiplier_bps: 20_000,
                },
            ],
            ubi_rate_bps: BPS_DENOMINATOR,

            max_supply: 21_000_000,
            halving_interval: 210_000,
            max_reprice_attempts: 3,

            compliance_timeout_ms: 3_000,
            compliance_cache_ttl_secs: 300,

            mint_max_attempts: 5,
            mint_backoff_base_ms: 200,
            mint_backoff_max_ms: 10_000,

            screening: ScreeningPolicy::default(),
        }
    }

    /// Reject internally inconsistent policies before the engine starts.
    pub fn validate(&self) -> Result<(), TypesError> {
        let fail = |msg: &str| Err(TypesError::InvalidPolicy(msg.to_string()));
        if self.pass_threshold_bps > BPS_DENOMINATOR {
            return fail("pass_threshold_bps must be <= 10000");
        }
        if self.base_amount == 0 {
            return fail("base_amount must be positive");
        }
        if self.max_supply == 0 {
            return fail("max_supply must be positive");
        }
        if self.halving_interval == 0 {
            return fail("halving_interval must be positive");
        }
        if self.grading_timeout_ms == 0 || self.compliance_timeout_ms == 0 {
            return fail("grading and compliance timeouts must be positive");
        }
        if self.mint_max_attempts == 0 {
            return fail("mint_max_attempts must be at least 1");
        }
        if self
            .score_tiers
            .iter()
            .any(|t| t.min_score_bps > BPS_DENOMINATOR)
        {
            return fail("score tier min_score_bps must be <= 10000");
        }
        self.screening.validate()
    }
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Anti-gaming heuristics. Each heuristic can be toggled and carries a
/// weight: its standalone confidence in basis points.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningPolicy {
    // ── Velocity ────────────────────────────────────────────────────────
    pub velocity_enabled: bool,
    pub velocity_window_secs: u64,
    pub max_submissions_per_window: u32,
    pub velocity_weight_bps: u32,

    // ── Collusion (shared wrong answers across requesters) ──────────────
    pub collusion_enabled: bool,
    /// How long wrong answers stay comparable across requesters.
    pub collusion_window_secs: u64,
    /// Share of this submission's wrong answers also given by someone else.
    pub collusion_similarity_bps: u32,
    pub collusion_min_wrong: u32,
    pub collusion_weight_bps: u32,

    // ── Timing ──────────────────────────────────────────────────────────
    pub timing_enabled: bool,
    /// Plausible minimum seconds per question per difficulty level.
    pub min_secs_per_question_per_difficulty: u64,
    pub timing_weight_bps: u32,

    // ── Perfect-score streak on hard challenges ─────────────────────────
    pub perfect_streak_enabled: bool,
    pub high_difficulty: u8,
    pub perfect_streak_threshold: u32,
    pub perfect_streak_weight_bps: u32,

    // ── Cooldown between accepted proofs ────────────────────────────────
    /// Zero disables the cooldown heuristic.
    pub cooldown_secs: u64,
    pub cooldown_weight_bps: u32,

    // ── External signal source ──────────────────────────────────────────
    pub external_enabled: bool,
    pub signal_timeout_ms: u64,
    /// External risk at or above this triggers the heuristic.
    pub external_risk_threshold_bps: u32,
    pub external_weight_bps: u32,

    // ── Decision thresholds ─────────────────────────────────────────────
    pub flag_threshold_bps: u32,
    pub block_threshold_bps: u32,
}

impl ScreeningPolicy {
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.flag_threshold_bps > self.block_threshold_bps {
            return Err(TypesError::InvalidPolicy(
                "screening flag threshold must not exceed block threshold".into(),
            ));
        }
        let weights = [
            self.velocity_weight_bps,
            self.collusion_weight_bps,
            self.timing_weight_bps,
            self.perfect_streak_weight_bps,
            self.cooldown_weight_bps,
            self.external_weight_bps,
            self.block_threshold_bps,
            self.collusion_similarity_bps,
            self.external_risk_threshold_bps,
        ];
        if weights.iter().any(|w| *w > BPS_DENOMINATOR) {
            return Err(TypesError::InvalidPolicy(
                "screening weights and thresholds must be <= 10000".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self {
            velocity_enabled: true,
            velocity_window_secs: 3_600,
            max_submissions_per_window: 10,
            velocity_weight_bps: 4_000,

            collusion_enabled: true,
            collusion_window_secs: 86_400,
            collusion_similarity_bps: 8_000,
            collusion_min_wrong: 2,
            collusion_weight_bps: 6_000,

            timing_enabled: true,
            min_secs_per_question_per_difficulty: 3,
            timing_weight_bps: 4_500,

            perfect_streak_enabled: true,
            high_difficulty: 4,
            perfect_streak_threshold: 3,
            perfect_streak_weight_bps: 3_500,

            cooldown_secs: 0,
            cooldown_weight_bps: 3_500,

            external_enabled: true,
            signal_timeout_ms: 1_000,
            external_risk_threshold_bps: 5_000,
            external_weight_bps: 5_000,

            flag_threshold_bps: 3_500,
            block_threshold_bps: 7_500,
        }
    }
}
