//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{
    LmdbAuditStore, LmdbError, LmdbMetaStore, LmdbReconciliationStore, LmdbRequestStore,
    LmdbSupplyStore,
};

/// Named databases the engine creates.
pub const DATABASE_NAMES: &[&str] = &[
    "supply_state",
    "issuances",
    "audit_entries",
    "audit_by_request",
    "requests",
    "reconciliation",
    "meta",
];

/// Default LMDB map size (1 GiB).
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) supply_db: Database<Bytes, Bytes>,
    pub(crate) issuances_db: Database<Bytes, Bytes>,
    pub(crate) audit_db: Database<Bytes, Bytes>,
    pub(crate) audit_index_db: Database<Bytes, Bytes>,
    pub(crate) requests_db: Database<Bytes, Bytes>,
    pub(crate) reconciliation_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// `max_dbs` must be at least the number of named databases.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        if (max_dbs as usize) < DATABASE_NAMES.len() {
            return Err(LmdbError::Schema(format!(
                "max_dbs {} is below the {} databases required",
                max_dbs,
                DATABASE_NAMES.len()
            )));
        }
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path and never
        // through another handle, which is the requirement heed places on `open`.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let supply_db = env.create_database(&mut wtxn, Some("supply_state"))?;
        let issuances_db = env.create_database(&mut wtxn, Some("issuances"))?;
        let audit_db = env.create_database(&mut wtxn, Some("audit_entries"))?;
        let audit_index_db = env.create_database(&mut wtxn, Some("audit_by_request"))?;
        let requests_db = env.create_database(&mut wtxn, Some("requests"))?;
        let reconciliation_db = env.create_database(&mut wtxn, Some("reconciliation"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            supply_db,
            issuances_db,
            audit_db,
            audit_index_db,
            requests_db,
            reconciliation_db,
            meta_db,
        })
    }

    /// Open with the default map size and database count.
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, DATABASE_NAMES.len() as u32 + 1, DEFAULT_MAP_SIZE)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn supply_store(&self) -> LmdbSupplyStore {
        LmdbSupplyStore {
            env: Arc::clone(&self.env),
            state_db: self.supply_db,
            issuances_db: self.issuances_db,
        }
    }

    pub fn audit_store(&self) -> LmdbAuditStore {
        LmdbAuditStore {
            env: Arc::clone(&self.env),
            entries_db: self.audit_db,
            by_request_db: self.audit_index_db,
        }
    }

    pub fn request_store(&self) -> LmdbRequestStore {
        LmdbRequestStore {
            env: Arc::clone(&self.env),
            requests_db: self.requests_db,
        }
    }

    pub fn reconciliation_store(&self) -> LmdbReconciliationStore {
        LmdbReconciliationStore {
            env: Arc::clone(&self.env),
            items_db: self.reconciliation_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::LmdbEnvironment;

    /// Keeps the temp dir alive for as long as the environment.
    pub struct TestEnv {
        pub env: LmdbEnvironment,
        _dir: tempfile::TempDir,
    }

    pub fn open_test_env() -> TestEnv {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 10, 1 << 24).unwrap();
        TestEnv { env, _dir: dir }
    }
}
