//! LMDB implementation of AuditStore.
//!
//! Entries live in `audit_entries` keyed by big-endian sequence number, so
//! LMDB's key order is sequence order. `audit_by_request` maps request id to
//! sequence.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use proofmint_store::{AuditStore, StoreError};
use proofmint_types::RequestId;

use crate::LmdbError;

pub struct LmdbAuditStore {
    pub(crate) env: Arc<Env>,
    pub(crate) entries_db: Database<Bytes, Bytes>,
    pub(crate) by_request_db: Database<Bytes, Bytes>,
}

fn decode_sequence(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Corruption("audit sequence key is not 8 bytes".into()))?;
    Ok(u64::from_be_bytes(arr))
}

impl AuditStore for LmdbAuditStore {
    fn append_entry(
        &self,
        sequence: u64,
        request_id: &RequestId,
        entry: &[u8],
    ) -> Result<(), StoreError> {
        let seq_key = sequence.to_be_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if self
            .by_request_db
            .get(&wtxn, request_id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("audit entry for {}", request_id)));
        }
        if self
            .entries_db
            .get(&wtxn, &seq_key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("audit sequence {}", sequence)));
        }

        self.entries_db
            .put(&mut wtxn, &seq_key, entry)
            .map_err(LmdbError::from)?;
        self.by_request_db
            .put(&mut wtxn, request_id.as_bytes(), &seq_key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_entry(&self, sequence: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .entries_db
            .get(&rtxn, &sequence.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn get_entry_by_request(&self, request_id: &RequestId) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(seq_key) = self
            .by_request_db
            .get(&rtxn, request_id.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        match self.entries_db.get(&rtxn, seq_key).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(bytes.to_vec())),
            None => Err(StoreError::Corruption(format!(
                "audit index for {} points at missing sequence {}",
                request_id,
                decode_sequence(seq_key)?
            ))),
        }
    }

    fn last_entry(&self) -> Result<Option<(u64, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.entries_db.last(&rtxn).map_err(LmdbError::from)? {
            Some((key, value)) => Ok(Some((decode_sequence(key)?, value.to_vec()))),
            None => Ok(None),
        }
    }

    fn iter_entries(&self) -> Result<Vec<(u64, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self.entries_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = item.map_err(LmdbError::from)?;
            results.push((decode_sequence(key)?, value.to_vec()));
        }
        Ok(results)
    }
}
