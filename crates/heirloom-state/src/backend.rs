//! Storage abstraction used by the deployment ledger.
//!
//! A backend provides transactional closures over two capability sets:
//! [`LedgerView`] for reads and [`LedgerTxn`] for writes. Every closure passed
//! to [`LedgerStore::write`] runs in one atomic transaction: when it returns
//! `Err`, nothing it wrote becomes visible.

use crate::error::{StateError, StateResult};
use crate::types::*;

/// Read capabilities: natural-key lookups and ordered queries.
pub trait LedgerView {
    /// Look up an application by name.
    fn application(&self, name: &str) -> StateResult<Option<Application>>;

    /// Look up an environment by name.
    fn environment(&self, name: &str) -> StateResult<Option<Environment>>;

    /// Look up a region by code.
    fn region(&self, code: &str) -> StateResult<Option<Region>>;

    /// All applications, ordered by name.
    fn applications(&self) -> StateResult<Vec<Application>>;

    /// All environments, ordered by name.
    fn environments(&self) -> StateResult<Vec<Environment>>;

    /// All regions, ordered by code.
    fn regions(&self) -> StateResult<Vec<Region>>;

    /// Deployments matching the filter, newest first.
    fn deployments(&self, filter: &DeploymentFilter) -> StateResult<Vec<Deployment>>;
}

/// Write capabilities, available inside [`LedgerStore::write`].
pub trait LedgerTxn: LedgerView {
    /// Fetch the application with this name, creating it if absent.
    fn upsert_application(&mut self, name: &str) -> StateResult<Application>;

    /// Fetch the environment with this name, creating it if absent.
    fn upsert_environment(&mut self, name: &str) -> StateResult<Environment>;

    /// Fetch the region with this code, creating it with `name` if absent.
    fn upsert_region(&mut self, code: &str, name: &str) -> StateResult<Region>;

    /// Insert a new deployment record and return it with its assigned id.
    fn insert_deployment(&mut self, new: NewDeployment) -> StateResult<Deployment>;

    /// Overwrite an existing deployment record.
    ///
    /// Fails with [`StateError::NotFound`] if the record does not exist.
    fn update_deployment(&mut self, deployment: &Deployment) -> StateResult<()>;

    /// Delete every deployment matching both the filter and the predicate.
    /// Returns the deleted records.
    fn delete_deployments(
        &mut self,
        filter: &DeploymentFilter,
        predicate: &dyn Fn(&Deployment) -> bool,
    ) -> StateResult<Vec<Deployment>>;
}

/// A transactional ledger backend.
pub trait LedgerStore: Clone + Send + Sync + 'static {
    /// Run `f` against a consistent read snapshot.
    fn read<R, E>(&self, f: impl FnOnce(&dyn LedgerView) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StateError>;

    /// Run `f` in a write transaction, committing only if it returns `Ok`.
    fn write<R, E>(&self, f: impl FnOnce(&mut dyn LedgerTxn) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StateError>;
}
