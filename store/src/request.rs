use crate::StoreError;
use proofmint_types::RequestId;

/// Persistence for request lifecycle records, so an interrupted request can
/// be resumed or resolved after a restart.
pub trait RequestStore: Send + Sync {
    /// Insert or overwrite the record for a request.
    fn put_request(&self, request_id: &RequestId, record: &[u8]) -> Result<(), StoreError>;

    fn get_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError>;

    fn iter_requests(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError>;
}
