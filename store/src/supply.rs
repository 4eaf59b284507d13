use crate::StoreError;
use proofmint_types::RequestId;

/// Durable state of the supply ledger.
///
/// The ledger keeps one state record (cap, total, rate, accepted count) and
/// a journal of every accepted issuance keyed by request id. Both are written
/// in one atomic commit so a crash can never leave the total and the journal
/// out of step.
pub trait SupplyStore: Send + Sync {
    /// Load the persisted state record, `None` on a fresh store.
    fn load_supply_state(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically replace the state record and journal one issuance.
    ///
    /// Returns [`StoreError::Duplicate`] without writing anything if the
    /// request id is already journaled.
    fn commit_issuance(
        &self,
        request_id: &RequestId,
        state: &[u8],
        issuance: &[u8],
    ) -> Result<(), StoreError>;

    /// Look up a journaled issuance.
    fn get_issuance(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Number of journaled issuances.
    fn issuance_count(&self) -> Result<u64, StoreError>;
}
