//! LMDB storage backend for the proofmint issuance engine.
//!
//! Implements all storage traits from `proofmint-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment.

pub mod audit;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod reconciliation;
pub mod request;
pub mod supply;

pub use audit::LmdbAuditStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use reconciliation::LmdbReconciliationStore;
pub use request::LmdbRequestStore;
pub use supply::LmdbSupplyStore;
