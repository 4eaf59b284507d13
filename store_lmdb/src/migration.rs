//! Schema versioning.
//!
//! The schema version lives in the `meta` database. A database without a
//! version is only stamped if it holds no issuance data; supply state or
//! journaled issuances without a version mean the meta record was lost, and
//! stamping over them would hide that.

use proofmint_store::MetaStore;

use crate::{LmdbEnvironment, LmdbError};

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub struct Migrator;

impl Migrator {
    /// Bring the environment's schema up to [`CURRENT_SCHEMA_VERSION`].
    ///
    /// Refuses databases written by a newer engine.
    pub fn run(env: &LmdbEnvironment) -> Result<(), LmdbError> {
        let meta = env.meta_store();
        let current = meta
            .get_schema_version()
            .map_err(|e| LmdbError::Schema(e.to_string()))?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }
        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Schema(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }
        if current == 0 {
            let issuances = issuance_data(env)?;
            if issuances > 0 {
                return Err(LmdbError::Schema(format!(
                    "unversioned database already holds issuance data ({} records)",
                    issuances
                )));
            }
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            migrate(version, version + 1)?;
        }

        meta.set_schema_version(CURRENT_SCHEMA_VERSION)
            .map_err(|e| LmdbError::Schema(e.to_string()))?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "database schema stamped");
        Ok(())
    }
}

/// Supply state and journal records present in the environment.
fn issuance_data(env: &LmdbEnvironment) -> Result<u64, LmdbError> {
    let rtxn = env.env().read_txn()?;
    Ok(env.supply_db.len(&rtxn)? + env.issuances_db.len(&rtxn)?)
}

fn migrate(from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        // Blank database: the named databases are created on open.
        (0, 1) => Ok(()),
        _ => Err(LmdbError::Schema(format!("no migration from {} to {}", from, to))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::open_test_env;
    use proofmint_store::SupplyStore;
    use proofmint_types::RequestId;

    #[test]
    fn unknown_migration_is_error() {
        assert!(migrate(1, 2).is_err());
    }

    #[test]
    fn fresh_database_is_stamped_once() {
        let t = open_test_env();
        Migrator::run(&t.env).unwrap();
        assert_eq!(t.env.meta_store().get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        Migrator::run(&t.env).unwrap();
    }

    #[test]
    fn newer_schema_is_refused() {
        let t = open_test_env();
        t.env
            .meta_store()
            .set_schema_version(CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(Migrator::run(&t.env), Err(LmdbError::Schema(_))));
    }

    #[test]
    fn unversioned_issuance_data_is_refused() {
        let t = open_test_env();
        t.env
            .supply_store()
            .commit_issuance(&RequestId::random(), b"state", b"issuance")
            .unwrap();
        let err = Migrator::run(&t.env).unwrap_err();
        assert!(err.to_string().contains("issuance data"));
        assert_eq!(t.env.meta_store().get_schema_version().unwrap(), 0);
    }
}
