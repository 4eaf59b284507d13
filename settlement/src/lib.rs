//! Mint adapter.
//!
//! Once the supply ledger has committed an issuance, the adapter submits the
//! mint instruction to the external settlement rail. Transient failures are
//! retried with capped exponential backoff; when the attempts run out (or the
//! rail rejects the instruction outright) the issuance goes to the
//! reconciliation queue, which a background worker keeps retrying. The
//! ledger is never rolled back: the rail is idempotent by request id, and a
//! submission that timed out may already have settled.

pub mod adapter;
pub mod backoff;
pub mod error;
pub mod rail;
pub mod reconciliation;

pub use adapter::{MintAdapter, SettlementOutcome};
pub use backoff::BackoffPolicy;
pub use error::SettlementError;
pub use rail::{HttpSettlementRail, MintInstruction, SettlementRail, SettlementReceipt};
pub use reconciliation::{ReconciliationItem, ReconciliationPass, ReconciliationQueue, ReconciliationWorker};
