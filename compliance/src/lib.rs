//! Compliance gate.
//!
//! Every issuance needs an explicit `approved` verdict from the external
//! KYC/AML authority. The gate bounds each call with a deadline and fails
//! closed: timeouts, transport errors and anything other than `approved`
//! halt issuance. Approvals are cached for a bounded TTL.

pub mod authority;
pub mod error;
pub mod gate;

pub use authority::{AuthorityResponse, ComplianceAuthority, HttpComplianceAuthority};
pub use error::ComplianceError;
pub use gate::{ComplianceGate, ComplianceVerdict};
