//! LMDB implementation of SupplyStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use proofmint_store::{StoreError, SupplyStore};
use proofmint_types::RequestId;

use crate::LmdbError;

const STATE_KEY: &[u8] = b"state";

pub struct LmdbSupplyStore {
    pub(crate) env: Arc<Env>,
    pub(crate) state_db: Database<Bytes, Bytes>,
    pub(crate) issuances_db: Database<Bytes, Bytes>,
}

impl SupplyStore for LmdbSupplyStore {
    fn load_supply_state(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .state_db
            .get(&rtxn, STATE_KEY)
            .map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn commit_issuance(
        &self,
        request_id: &RequestId,
        state: &[u8],
        issuance: &[u8],
    ) -> Result<(), StoreError> {
        let key = request_id.as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .issuances_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("issuance {}", request_id)));
        }
        self.issuances_db
            .put(&mut wtxn, key, issuance)
            .map_err(LmdbError::from)?;
        self.state_db
            .put(&mut wtxn, STATE_KEY, state)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_issuance(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .issuances_db
            .get(&rtxn, request_id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn issuance_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.issuances_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
