//! Supply ledger and reward calculator.
//!
//! The ledger is the single serialization point for supply mutation: one
//! mutex-guarded state object, persisted before every in-memory commit. The
//! reward calculator is a set of pure integer functions; the ledger never
//! prices anything, it only accepts or rejects an amount priced at a given
//! rate.

pub mod error;
pub mod ledger;
pub mod reward;
pub mod state;

pub use error::SupplyError;
pub use ledger::{IssueOutcome, IssueRequest, Rejection, SupplyLedger};
pub use reward::{compute_reward, RequesterProfile, RewardBreakdown};
pub use state::{MintTransaction, SupplyState, SupplyStats};
