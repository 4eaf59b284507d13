//! Fundamental types for the proofmint issuance engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, token amounts, the issuance rate, timestamps and clocks, hashes,
//! the issuance policy, and the request lifecycle states.

pub mod amount;
pub mod error;
pub mod hash;
pub mod ids;
pub mod params;
pub mod rate;
pub mod state;
pub mod time;

pub use amount::TokenAmount;
pub use error::TypesError;
pub use hash::Hash256;
pub use ids::{ChallengeId, RequestId, RequesterId};
pub use params::{IssuancePolicy, ScoreTier, ScreeningPolicy, StakeTier, BPS_DENOMINATOR};
pub use rate::IssuanceRate;
pub use state::{AuditStatus, ComplianceStatus, RequestState, ScreeningAction};
pub use time::{Clock, SystemClock, Timestamp};
