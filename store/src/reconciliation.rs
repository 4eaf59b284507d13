use crate::StoreError;
use proofmint_types::RequestId;

/// Durable record of committed issuances whose settlement failed inline.
///
/// Items stay after they settle (with the settlement tx id filled in) so the
/// reconciliation history can be inspected.
pub trait ReconciliationStore: Send + Sync {
    /// Insert or overwrite the item for a request.
    fn put_item(&self, request_id: &RequestId, item: &[u8]) -> Result<(), StoreError>;

    fn iter_items(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError>;
}
