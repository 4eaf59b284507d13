//! LMDB implementation of ReconciliationStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use proofmint_store::{ReconciliationStore, StoreError};
use proofmint_types::RequestId;

use crate::request::decode_request_id;
use crate::LmdbError;

pub struct LmdbReconciliationStore {
    pub(crate) env: Arc<Env>,
    pub(crate) items_db: Database<Bytes, Bytes>,
}

impl ReconciliationStore for LmdbReconciliationStore {
    fn put_item(&self, request_id: &RequestId, item: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.items_db
            .put(&mut wtxn, request_id.as_bytes(), item)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn iter_items(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self.items_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = item.map_err(LmdbError::from)?;
            results.push((decode_request_id(key)?, value.to_vec()));
        }
        Ok(results)
    }
}
