//! HTTP API for the proofmint issuance engine.
//!
//! Provides endpoints for:
//! - Challenge registration by the learning platform
//! - Proof submission and request status, keyed by idempotency key
//! - Cancellation before the ledger is reached
//! - Supply statistics and the reconciliation backlog
//! - Audit entries and chain verification
//! - Prometheus metrics and liveness

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer, RpcState};
