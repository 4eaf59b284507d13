//! Reward calculator.
//!
//! ```text
//! reward = base × (correct / total) × rate × (1 + levelBonus)
//!        × scoreMultiplier × stakeMultiplier × ubiRate
//! ```
//!
//! Every factor is an exact fraction; the product is built as one numerator
//! over one denominator and floored by a single final division, so the
//! result never depends on the order of operations.

use proofmint_types::{IssuancePolicy, IssuanceRate, TokenAmount, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

use crate::error::SupplyError;

/// What the learning platform tells us about the requester.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequesterProfile {
    pub level: u32,
    /// Days the requester has locked a stake for, if staking.
    pub stake_lock_days: Option<u32>,
}

/// Every factor that went into a reward, for the audit entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardBreakdown {
    pub base_amount: u128,
    pub correct: u32,
    pub total: u32,
    pub rate: IssuanceRate,
    pub level_bonus_bps: u32,
    pub score_multiplier_bps: u32,
    pub stake_multiplier_bps: u32,
    pub ubi_rate_bps: u32,
    /// Floored reward.
    pub amount: TokenAmount,
    /// Discarded fraction of a unit: `remainder / divisor`.
    pub remainder: u128,
    /// Saturates at `u128::MAX` when the exact divisor is not representable.
    pub divisor: u128,
}

/// Level bonus in basis points: `min(level × perLevel, max)`.
pub fn level_bonus_bps(policy: &IssuancePolicy, level: u32) -> u32 {
    level
        .saturating_mul(policy.level_bonus_bps_per_level)
        .min(policy.max_level_bonus_bps)
}

/// Multiplier of the highest score tier the score reaches.
pub fn score_multiplier_bps(policy: &IssuancePolicy, correct: u32, total: u32) -> u32 {
    policy
        .score_tiers
        .iter()
        .filter(|t| correct as u64 * BPS_DENOMINATOR as u64 >= t.min_score_bps as u64 * total as u64)
        .max_by_key(|t| t.min_score_bps)
        .map_or(BPS_DENOMINATOR, |t| t.multiplier_bps)
}

/// Multiplier of the longest lock tier the requester qualifies for.
pub fn stake_multiplier_bps(policy: &IssuancePolicy, lock_days: Option<u32>) -> u32 {
    let Some(days) = lock_days else {
        return BPS_DENOMINATOR;
    };
    policy
        .stake_tiers
        .iter()
        .filter(|t| days >= t.min_lock_days)
        .max_by_key(|t| t.min_lock_days)
        .map_or(BPS_DENOMINATOR, |t| t.multiplier_bps)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Exact fraction that reduces after every multiplication to keep the
/// intermediate values small.
struct Fraction {
    num: u128,
    /// `None` once the denominator outgrows u128.
    den: Option<u128>,
}

impl Fraction {
    fn new() -> Self {
        Self { num: 1, den: Some(1) }
    }

    fn mul(mut self, num: u128, den: u128) -> Result<Self, SupplyError> {
        if num == 0 {
            return Ok(Self { num: 0, den: Some(1) });
        }
        let Some(current_den) = self.den else {
            // Too small to represent; it floors to zero either way.
            self.num = self.num.saturating_mul(num);
            return Ok(self);
        };
        // Cross-reduce before multiplying.
        let g1 = gcd(self.num, den);
        let g2 = gcd(num, current_den);
        let num = (self.num / g1)
            .checked_mul(num / g2)
            .ok_or(SupplyError::Overflow)?;
        let den = (current_den / g2).checked_mul(den / g1);
        Ok(Self { num, den })
    }
}

/// Price a verified proof at `rate`.
pub fn compute_reward(
    policy: &IssuancePolicy,
    correct: u32,
    total: u32,
    rate: IssuanceRate,
    profile: &RequesterProfile,
) -> Result<RewardBreakdown, SupplyError> {
    if total == 0 {
        return Err(SupplyError::EmptyScore);
    }
    let bps = BPS_DENOMINATOR as u128;
    let level_bonus = level_bonus_bps(policy, profile.level);
    let score_mult = score_multiplier_bps(policy, correct, total);
    let stake_mult = stake_multiplier_bps(policy, profile.stake_lock_days);

    let mut fraction = Fraction::new()
        .mul(policy.base_amount as u128, 1)?
        .mul(correct as u128, total as u128)?;
    fraction = match rate.denominator() {
        Some(rate_den) => fraction.mul(rate.numerator(), rate_den)?,
        None => fraction.mul(0, 1)?,
    };
    let fraction = fraction
        .mul(bps + level_bonus as u128, bps)?
        .mul(score_mult as u128, bps)?
        .mul(stake_mult as u128, bps)?
        .mul(policy.ubi_rate_bps as u128, bps)?;

    let (amount, remainder, divisor) = match fraction.den {
        Some(den) => (fraction.num / den, fraction.num % den, den),
        None => (0, fraction.num, u128::MAX),
    };

    Ok(RewardBreakdown {
        base_amount: policy.base_amount as u128,
        correct,
        total,
        rate,
        level_bonus_bps: level_bonus,
        score_multiplier_bps: score_mult,
        stake_multiplier_bps: stake_mult,
        ubi_rate_bps: policy.ubi_rate_bps,
        amount: TokenAmount::new(amount),
        remainder,
        divisor,
    })
}
