//! Nullable store: thread-safe in-memory storage for testing.

use proofmint_store::{
    AuditStore, MetaStore, ReconciliationStore, RequestStore, StoreError, SupplyStore,
};
use proofmint_types::RequestId;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An in-memory implementation of every storage trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
///
/// Audit appends and supply commits can be made to fail on demand, to drive
/// the engine's storage-failure paths.
pub struct NullStore {
    supply_state: Mutex<Option<Vec<u8>>>,
    issuances: Mutex<HashMap<RequestId, Vec<u8>>>,
    audit: Mutex<BTreeMap<u64, (RequestId, Vec<u8>)>>,
    audit_by_request: Mutex<HashMap<RequestId, u64>>,
    requests: Mutex<BTreeMap<RequestId, Vec<u8>>>,
    reconciliation: Mutex<BTreeMap<RequestId, Vec<u8>>>,
    meta: Mutex<HashMap<String, Vec<u8>>>,
    fail_audit: AtomicBool,
    fail_supply: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            supply_state: Mutex::new(None),
            issuances: Mutex::new(HashMap::new()),
            audit: Mutex::new(BTreeMap::new()),
            audit_by_request: Mutex::new(HashMap::new()),
            requests: Mutex::new(BTreeMap::new()),
            reconciliation: Mutex::new(BTreeMap::new()),
            meta: Mutex::new(HashMap::new()),
            fail_audit: AtomicBool::new(false),
            fail_supply: AtomicBool::new(false),
        }
    }

    /// Make audit appends fail with a backend error.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Make supply commits fail with a backend error.
    pub fn fail_supply_commits(&self, fail: bool) {
        self.fail_supply.store(fail, Ordering::SeqCst);
    }

    pub fn audit_len(&self) -> usize {
        self.audit.lock().unwrap().len()
    }

    /// Overwrite an audit entry in place, bypassing append-only semantics,
    /// to simulate tampering.
    pub fn tamper_audit_entry(&self, sequence: u64, entry: Vec<u8>) {
        if let Some(slot) = self.audit.lock().unwrap().get_mut(&sequence) {
            slot.1 = entry;
        }
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SupplyStore for NullStore {
    fn load_supply_state(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.supply_state.lock().unwrap().clone())
    }

    fn commit_issuance(
        &self,
        request_id: &RequestId,
        state: &[u8],
        issuance: &[u8],
    ) -> Result<(), StoreError> {
        if self.fail_supply.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store supply commits disabled".into()));
        }
        let mut issuances = self.issuances.lock().unwrap();
        if issuances.contains_key(request_id) {
            return Err(StoreError::Duplicate(request_id.to_string()));
        }
        issuances.insert(*request_id, issuance.to_vec());
        *self.supply_state.lock().unwrap() = Some(state.to_vec());
        Ok(())
    }

    fn get_issuance(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.issuances.lock().unwrap().get(request_id).cloned())
    }

    fn issuance_count(&self) -> Result<u64, StoreError> {
        Ok(self.issuances.lock().unwrap().len() as u64)
    }
}

impl AuditStore for NullStore {
    fn append_entry(
        &self,
        sequence: u64,
        request_id: &RequestId,
        entry: &[u8],
    ) -> Result<(), StoreError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store audit writes disabled".into()));
        }
        let mut audit = self.audit.lock().unwrap();
        let mut index = self.audit_by_request.lock().unwrap();
        if audit.contains_key(&sequence) {
            return Err(StoreError::Duplicate(format!("audit sequence {}", sequence)));
        }
        if index.contains_key(request_id) {
            return Err(StoreError::Duplicate(request_id.to_string()));
        }
        audit.insert(sequence, (*request_id, entry.to_vec()));
        index.insert(*request_id, sequence);
        Ok(())
    }

    fn get_entry(&self, sequence: u64) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.audit.lock().unwrap().get(&sequence).map(|(_, e)| e.clone()))
    }

    fn get_entry_by_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(seq) = self.audit_by_request.lock().unwrap().get(request_id).copied() else {
            return Ok(None);
        };
        self.get_entry(seq)
    }

    fn last_entry(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .audit
            .lock()
            .unwrap()
            .iter()
            .next_back()
            .map(|(seq, (_, e))| (*seq, e.clone())))
    }

    fn iter_entries(&self) -> Result<Vec<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .audit
            .lock()
            .unwrap()
            .iter()
            .map(|(seq, (_, e))| (*seq, e.clone()))
            .collect())
    }
}

impl RequestStore for NullStore {
    fn put_request(&self, request_id: &RequestId, record: &[u8]) -> Result<(), StoreError> {
        self.requests.lock().unwrap().insert(*request_id, record.to_vec());
        Ok(())
    }

    fn get_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.requests.lock().unwrap().get(request_id).cloned())
    }

    fn iter_requests(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }
}

impl ReconciliationStore for NullStore {
    fn put_item(&self, request_id: &RequestId, item: &[u8]) -> Result<(), StoreError> {
        self.reconciliation.lock().unwrap().insert(*request_id, item.to_vec());
        Ok(())
    }

    fn iter_items(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError> {
        Ok(self
            .reconciliation
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.meta.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.meta.lock().unwrap().get(key).cloned())
    }
}
