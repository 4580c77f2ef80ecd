//! RedbStore — redb-backed persistence for the Heirloom ledger.
//!
//! Implements [`LedgerStore`] over five tables (see [`crate::tables`]). All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).
//!
//! redb admits one write transaction at a time, so every closure passed to
//! [`LedgerStore::write`] observes and mutates the ledger in isolation.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable, Table,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::{LedgerStore, LedgerTxn, LedgerView};
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type ReadTable = ReadOnlyTable<&'static str, &'static [u8]>;
type WriteTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

/// Thread-safe ledger store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "ledger store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory ledger store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        txn.open_table(ENVIRONMENTS).map_err(map_err!(Table))?;
        txn.open_table(REGIONS).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl LedgerStore for RedbStore {
    fn read<R, E>(&self, f: impl FnOnce(&dyn LedgerView) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StateError>,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let tables = Tables::open_read(&txn)?;
        f(&tables)
    }

    fn write<R, E>(&self, f: impl FnOnce(&mut dyn LedgerTxn) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut tables = Tables::open_write(&txn)?;
            f(&mut tables)
        };
        match outcome {
            Ok(value) => {
                txn.commit().map_err(map_err!(Transaction))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "failed to abort write transaction");
                }
                Err(e)
            }
        }
    }
}

/// The ledger tables opened within one transaction.
struct Tables<T> {
    applications: T,
    environments: T,
    regions: T,
    deployments: T,
    sequences: T,
}

impl Tables<ReadTable> {
    fn open_read(txn: &ReadTransaction) -> StateResult<Self> {
        Ok(Self {
            applications: txn.open_table(APPLICATIONS).map_err(map_err!(Table))?,
            environments: txn.open_table(ENVIRONMENTS).map_err(map_err!(Table))?,
            regions: txn.open_table(REGIONS).map_err(map_err!(Table))?,
            deployments: txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?,
            sequences: txn.open_table(SEQUENCES).map_err(map_err!(Table))?,
        })
    }
}

impl<'txn> Tables<WriteTable<'txn>> {
    fn open_write(txn: &'txn WriteTransaction) -> StateResult<Self> {
        Ok(Self {
            applications: txn.open_table(APPLICATIONS).map_err(map_err!(Table))?,
            environments: txn.open_table(ENVIRONMENTS).map_err(map_err!(Table))?,
            regions: txn.open_table(REGIONS).map_err(map_err!(Table))?,
            deployments: txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?,
            sequences: txn.open_table(SEQUENCES).map_err(map_err!(Table))?,
        })
    }

    /// Allocate the next id of a sequence.
    fn next_id(&mut self, sequence: &str) -> StateResult<u64> {
        let current: u64 = get_json(&self.sequences, sequence)?.unwrap_or(0);
        let next = current + 1;
        put_json(&mut self.sequences, sequence, &next)?;
        Ok(next)
    }
}

impl<T> LedgerView for Tables<T>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    fn application(&self, name: &str) -> StateResult<Option<Application>> {
        get_json(&self.applications, name)
    }

    fn environment(&self, name: &str) -> StateResult<Option<Environment>> {
        get_json(&self.environments, name)
    }

    fn region(&self, code: &str) -> StateResult<Option<Region>> {
        get_json(&self.regions, code)
    }

    fn applications(&self) -> StateResult<Vec<Application>> {
        scan_json(&self.applications, "")
    }

    fn environments(&self) -> StateResult<Vec<Environment>> {
        scan_json(&self.environments, "")
    }

    fn regions(&self) -> StateResult<Vec<Region>> {
        scan_json(&self.regions, "")
    }

    fn deployments(&self, filter: &DeploymentFilter) -> StateResult<Vec<Deployment>> {
        let mut results: Vec<Deployment> = scan_json(&self.deployments, &filter.key_prefix())?;
        results.retain(|d| filter.matches(d));
        results.sort_by(newest_first);
        Ok(results)
    }
}

impl LedgerTxn for Tables<WriteTable<'_>> {
    fn upsert_application(&mut self, name: &str) -> StateResult<Application> {
        if let Some(existing) = get_json(&self.applications, name)? {
            return Ok(existing);
        }
        let app = Application {
            id: self.next_id(APPLICATION_SEQ)?,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        put_json(&mut self.applications, name, &app)?;
        debug!(name, id = app.id, "application created");
        Ok(app)
    }

    fn upsert_environment(&mut self, name: &str) -> StateResult<Environment> {
        if let Some(existing) = get_json(&self.environments, name)? {
            return Ok(existing);
        }
        let env = Environment {
            id: self.next_id(ENVIRONMENT_SEQ)?,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        put_json(&mut self.environments, name, &env)?;
        debug!(name, id = env.id, "environment created");
        Ok(env)
    }

    fn upsert_region(&mut self, code: &str, name: &str) -> StateResult<Region> {
        if let Some(existing) = get_json(&self.regions, code)? {
            return Ok(existing);
        }
        let region = Region {
            id: self.next_id(REGION_SEQ)?,
            code: code.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        put_json(&mut self.regions, code, &region)?;
        debug!(code, id = region.id, "region created");
        Ok(region)
    }

    fn insert_deployment(&mut self, new: NewDeployment) -> StateResult<Deployment> {
        let deployment = Deployment {
            id: self.next_id(DEPLOYMENT_SEQ)?,
            application_id: new.application.id,
            environment_id: new.environment.id,
            region_id: new.region.id,
            application: new.application.name,
            environment: new.environment.name,
            region: new.region.code,
            version: new.version,
            status: DeploymentStatus::Active,
            deployed_by: new.deployed_by,
            deployed_at: new.deployed_at,
            rollback_target_id: new.rollback_target_id,
        };
        let key = deployment.table_key();
        put_json(&mut self.deployments, &key, &deployment)?;
        debug!(%key, "deployment stored");
        Ok(deployment)
    }

    fn update_deployment(&mut self, deployment: &Deployment) -> StateResult<()> {
        let key = deployment.table_key();
        let exists = self
            .deployments
            .get(key.as_str())
            .map_err(map_err!(Read))?
            .is_some();
        if !exists {
            return Err(StateError::NotFound(format!("deployment {}", deployment.id)));
        }
        put_json(&mut self.deployments, &key, deployment)?;
        debug!(%key, status = %deployment.status, "deployment updated");
        Ok(())
    }

    fn delete_deployments(
        &mut self,
        filter: &DeploymentFilter,
        predicate: &dyn Fn(&Deployment) -> bool,
    ) -> StateResult<Vec<Deployment>> {
        // Collect first; the table cannot be mutated while a range is open.
        let doomed: Vec<Deployment> = self
            .deployments(filter)?
            .into_iter()
            .filter(|d| predicate(d))
            .collect();
        for d in &doomed {
            self.deployments
                .remove(d.table_key().as_str())
                .map_err(map_err!(Write))?;
        }
        debug!(count = doomed.len(), "deployments deleted");
        Ok(doomed)
    }
}

fn get_json<T, R>(table: &T, key: &str) -> StateResult<Option<R>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    R: DeserializeOwned,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Decode every value whose key starts with `prefix`, in key order.
fn scan_json<T, R>(table: &T, prefix: &str) -> StateResult<Vec<R>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
    R: DeserializeOwned,
{
    let mut results = Vec::new();
    for entry in table.range(prefix..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if !key.value().starts_with(prefix) {
            break;
        }
        let item = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push(item);
    }
    Ok(results)
}

fn put_json<V: Serialize + ?Sized>(
    table: &mut WriteTable<'_>,
    key: &str,
    value: &V,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    /// Insert a deployment for `svc/prod/us-east` released `offset` seconds after base.
    fn seed(store: &RedbStore, version: &str, offset: i64) -> Deployment {
        store
            .write(|txn| -> StateResult<Deployment> {
                let new = NewDeployment {
                    application: txn.upsert_application("svc")?,
                    environment: txn.upsert_environment("prod")?,
                    region: txn.upsert_region("us-east", "us-east")?,
                    version: version.to_string(),
                    deployed_by: "tester".to_string(),
                    deployed_at: base_time() + Duration::seconds(offset),
                    rollback_target_id: None,
                };
                txn.insert_deployment(new)
            })
            .unwrap()
    }

    // ── Upserts ────────────────────────────────────────────────────

    #[test]
    fn upsert_is_idempotent_by_natural_key() {
        let store = RedbStore::open_in_memory().unwrap();
        let first = store
            .write(|txn| txn.upsert_application("svc"))
            .unwrap();
        let second = store
            .write(|txn| txn.upsert_application("svc"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.read(|v| v.applications()).unwrap().len(), 1);
    }

    #[test]
    fn region_keeps_display_name() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .write(|txn| txn.upsert_region("eu-west", "Ireland"))
            .unwrap();
        // A later upsert with another name does not rename the region.
        let region = store
            .write(|txn| txn.upsert_region("eu-west", "eu-west"))
            .unwrap();
        assert_eq!(region.name, "Ireland");
    }

    #[test]
    fn sequences_are_per_entity() {
        let store = RedbStore::open_in_memory().unwrap();
        let (app, env, other_app) = store
            .write(|txn| -> StateResult<_> {
                Ok((
                    txn.upsert_application("a")?,
                    txn.upsert_environment("prod")?,
                    txn.upsert_application("b")?,
                ))
            })
            .unwrap();
        assert_eq!(app.id, 1);
        assert_eq!(env.id, 1);
        assert_eq!(other_app.id, 2);
    }

    #[test]
    fn lookups_on_empty_store_return_none() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .read(|v| -> StateResult<()> {
                assert!(v.application("nope")?.is_none());
                assert!(v.environment("nope")?.is_none());
                assert!(v.region("nope")?.is_none());
                assert!(v.deployments(&DeploymentFilter::new())?.is_empty());
                Ok(())
            })
            .unwrap();
    }

    // ── Deployments ────────────────────────────────────────────────

    #[test]
    fn deployments_listed_newest_first() {
        let store = RedbStore::open_in_memory().unwrap();
        seed(&store, "v1", 0);
        seed(&store, "v3", 20);
        seed(&store, "v2", 10);

        let rows = store
            .read(|v| v.deployments(&DeploymentFilter::new()))
            .unwrap();
        let versions: Vec<_> = rows.iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, vec!["v3", "v2", "v1"]);
        assert!(rows.iter().all(|d| d.is_active()));
    }

    #[test]
    fn deployments_filtered_by_triple_and_status() {
        let store = RedbStore::open_in_memory().unwrap();
        let d = seed(&store, "v1", 0);
        store
            .write(|txn| -> StateResult<()> {
                let new = NewDeployment {
                    application: txn.upsert_application("svc")?,
                    environment: txn.upsert_environment("staging")?,
                    region: txn.upsert_region("us-east", "us-east")?,
                    version: "v1".to_string(),
                    deployed_by: "tester".to_string(),
                    deployed_at: base_time(),
                    rollback_target_id: None,
                };
                txn.insert_deployment(new)?;
                Ok(())
            })
            .unwrap();

        let triple = store
            .read(|v| v.deployments(&DeploymentFilter::for_triple(d.triple())))
            .unwrap();
        assert_eq!(triple, vec![d.clone()]);

        let by_app = store
            .read(|v| v.deployments(&DeploymentFilter::new().with_application(d.application_id)))
            .unwrap();
        assert_eq!(by_app.len(), 2);

        let inactive = store
            .read(|v| {
                v.deployments(&DeploymentFilter::new().with_status(DeploymentStatus::Inactive))
            })
            .unwrap();
        assert!(inactive.is_empty());
    }

    #[test]
    fn update_changes_status_in_place() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut d = seed(&store, "v1", 0);
        d.status = DeploymentStatus::Inactive;
        store.write(|txn| txn.update_deployment(&d)).unwrap();

        let rows = store
            .read(|v| v.deployments(&DeploymentFilter::for_triple(d.triple())))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, DeploymentStatus::Inactive);
    }

    #[test]
    fn update_missing_deployment_fails() {
        let store = RedbStore::open_in_memory().unwrap();
        let mut d = seed(&store, "v1", 0);
        d.id = 99;
        let err = store.write(|txn| txn.update_deployment(&d)).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
        // The failed update must not have inserted the phantom row.
        let rows = store
            .read(|v| v.deployments(&DeploymentFilter::new()))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn delete_by_predicate_returns_deleted_rows() {
        let store = RedbStore::open_in_memory().unwrap();
        seed(&store, "v1", 0);
        seed(&store, "v2", 10);
        let keep = seed(&store, "v3", 20);

        let deleted = store
            .write(|txn| {
                let predicate = |d: &Deployment| d.version != "v3";
                txn.delete_deployments(&DeploymentFilter::new(), &predicate)
            })
            .unwrap();
        assert_eq!(deleted.len(), 2);

        let rows = store
            .read(|v| v.deployments(&DeploymentFilter::new()))
            .unwrap();
        assert_eq!(rows, vec![keep]);
    }

    // ── Transactions ───────────────────────────────────────────────

    #[test]
    fn failed_write_rolls_back_everything() {
        let store = RedbStore::open_in_memory().unwrap();
        let result: StateResult<()> = store.write(|txn| {
            txn.upsert_application("svc")?;
            txn.upsert_environment("prod")?;
            Err(StateError::NotFound("forced".to_string()))
        });
        assert!(result.is_err());

        store
            .read(|v| -> StateResult<()> {
                assert!(v.application("svc")?.is_none());
                assert!(v.environments()?.is_empty());
                Ok(())
            })
            .unwrap();

        // Sequence allocation was rolled back too.
        let app = store.write(|txn| txn.upsert_application("svc")).unwrap();
        assert_eq!(app.id, 1);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.redb");

        {
            let store = RedbStore::open(&db_path).unwrap();
            seed(&store, "v1", 0);
        }

        // Reopen the same database file.
        let store = RedbStore::open(&db_path).unwrap();
        let rows = store
            .read(|v| v.deployments(&DeploymentFilter::new()))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, "v1");
        assert!(store.read(|v| v.application("svc")).unwrap().is_some());
    }
}
