//! Abstract storage traits for the proofmint issuance engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Values are opaque `Vec<u8>` so the store doesn't depend on the crates that
//! own the record types; each owner serializes its own records.

pub mod audit;
pub mod error;
pub mod meta;
pub mod reconciliation;
pub mod request;
pub mod supply;

pub use audit::AuditStore;
pub use error::StoreError;
pub use meta::MetaStore;
pub use reconciliation::ReconciliationStore;
pub use request::RequestStore;
pub use supply::SupplyStore;
