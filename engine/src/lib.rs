//! Issuance orchestrator.
//!
//! Drives a mint request through its lifecycle:
//!
//! ```text
//! RECEIVED → VERIFYING → SCREENING → COMPLIANCE_CHECK → CALCULATING
//!          → LEDGER_CHECK → MINTING → CONFIRMED
//! ```
//!
//! Every terminal state is audited exactly once before it is reported.
//! Requests are keyed by a caller-supplied idempotency key; resubmitting a
//! key returns the recorded result without re-running side effects, and
//! concurrent submissions with the same key share one execution.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod orchestrator;
pub mod recovery;
pub mod request;
pub mod shutdown;
pub mod spans;
mod table;
mod trail;

pub use config::EngineConfig;
pub use error::EngineError;
pub use metrics::EngineMetrics;
pub use maintenance::{MaintenancePass, MaintenanceWorker};
pub use orchestrator::{EngineDeps, EngineOptions, IssuanceOrchestrator};
pub use recovery::RecoveryReport;
pub use request::{MintRequestRecord, MintRequestStatus, SubmitProof};
pub use shutdown::ShutdownController;
