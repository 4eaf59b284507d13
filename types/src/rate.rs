//! The decaying issuance rate.
//!
//! The rate is stored as an initial value in basis points plus the number of
//! halvings applied so far, so `rate = initial_bps / 10_000 / 2^halvings` is
//! exact and halving never accumulates floating-point error.

use crate::params::BPS_DENOMINATOR;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current per-unit issuance rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuanceRate {
    /// Rate before any halving, in basis points (10_000 = 1.0).
    pub initial_bps: u32,
    /// Number of halvings applied.
    pub halvings: u32,
}

impl IssuanceRate {
    pub fn new(initial_bps: u32) -> Self {
        Self {
            initial_bps,
            halvings: 0,
        }
    }

    /// The rate after one more halving.
    pub fn halved(self) -> Self {
        Self {
            initial_bps: self.initial_bps,
            halvings: self.halvings.saturating_add(1),
        }
    }

    /// Numerator of the exact rate fraction.
    pub fn numerator(&self) -> u128 {
        self.initial_bps as u128
    }

    /// Denominator of the exact rate fraction, `None` once the rate has
    /// decayed below anything representable (treated as zero).
    pub fn denominator(&self) -> Option<u128> {
        1u128
            .checked_shl(self.halvings)
            .filter(|_| self.halvings < 100)
            .and_then(|pow| pow.checked_mul(BPS_DENOMINATOR as u128))
    }

    /// Whether the rate has decayed to nothing.
    pub fn is_zero(&self) -> bool {
        self.initial_bps == 0 || self.denominator().is_none()
    }

    /// Approximate value for display and metrics.
    pub fn as_f64(&self) -> f64 {
        match self.denominator() {
            Some(den) => self.numerator() as f64 / den as f64,
            None => 0.0,
        }
    }
}

impl fmt::Display for IssuanceRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.as_f64())
    }
}
