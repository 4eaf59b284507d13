//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engine (clock, compliance authority,
//! settlement rail, risk signal, grader, storage) sits behind a trait. This
//! crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod collaborators;
pub mod store;

pub use clock::NullClock;
pub use collaborators::{NullComplianceAuthority, NullGrader, NullSettlementRail, NullSignalSource};
pub use store::NullStore;
