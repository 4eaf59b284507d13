//! Audit log.
//!
//! Exactly one entry per request reaching a terminal state. Entries are
//! append-only and hash-chained: each carries the previous entry's hash and
//! its own, so any later edit to a stored entry is detectable.

pub mod entry;
pub mod error;
pub mod log;

pub use entry::{
    AuditLogEntry, ComplianceSnapshot, MintDetails, ProofSnapshot, ScreeningSnapshot, SupplySnapshot,
};
pub use error::AuditError;
pub use log::{AuditLog, ChainReport, WriteOutcome};
