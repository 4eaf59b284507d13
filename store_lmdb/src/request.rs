//! LMDB implementation of RequestStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use proofmint_store::{RequestStore, StoreError};
use proofmint_types::RequestId;

use crate::LmdbError;

pub struct LmdbRequestStore {
    pub(crate) env: Arc<Env>,
    pub(crate) requests_db: Database<Bytes, Bytes>,
}

pub(crate) fn decode_request_id(bytes: &[u8]) -> Result<RequestId, StoreError> {
    let arr: [u8; 16] = bytes
        .try_into()
        .map_err(|_| StoreError::Corruption("request key is not 16 bytes".into()))?;
    Ok(RequestId::from_bytes(arr))
}

impl RequestStore for LmdbRequestStore {
    fn put_request(&self, request_id: &RequestId, record: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.requests_db
            .put(&mut wtxn, request_id.as_bytes(), record)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .requests_db
            .get(&rtxn, request_id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn iter_requests(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self.requests_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = item.map_err(LmdbError::from)?;
            results.push((decode_request_id(key)?, value.to_vec()));
        }
        Ok(results)
    }
}
