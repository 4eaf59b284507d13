use crate::StoreError;
use proofmint_types::RequestId;

/// Append-only storage for the hash-chained audit log.
///
/// Entries are keyed by sequence number and indexed by request id; at most
/// one entry exists per request.
pub trait AuditStore: Send + Sync {
    /// Append an entry.
    ///
    /// Returns [`StoreError::Duplicate`] if the sequence number or the
    /// request id is already present. Nothing is written in that case.
    fn append_entry(&self, sequence: u64, request_id: &RequestId, entry: &[u8])
        -> Result<(), StoreError>;

    fn get_entry(&self, sequence: u64) -> Result<Option<Vec<u8>>, StoreError>;

    fn get_entry_by_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError>;

    /// The entry with the highest sequence number.
    fn last_entry(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError>;

    /// All entries in ascending sequence order.
    fn iter_entries(&self) -> Result<Vec<(u64, Vec<u8>)>, StoreError>;
}
