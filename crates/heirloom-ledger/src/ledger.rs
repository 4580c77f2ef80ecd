//! Release, rollback, and retention over a [`LedgerStore`].
//!
//! Every transition runs inside one [`LedgerStore::write`] transaction, so
//! the "at most one active record per triple" rule holds at every commit.
//! Pruning after a release runs in its own transaction and is best-effort.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use heirloom_state::{
    Deployment, DeploymentFilter, DeploymentId, DeploymentStatus, LedgerStore, NewDeployment,
    RedbStore, Triple,
};
use tracing::{Span, debug, info, info_span, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::query::resolve_triple;
use crate::request::{ReleaseRequest, RollbackRequest, non_blank};

/// The deployment ledger over a storage backend.
#[derive(Clone)]
pub struct Ledger<S = RedbStore> {
    pub(crate) store: S,
    config: Arc<LedgerConfig>,
    pub(crate) span: Span,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            span: info_span!("ledger"),
        }
    }

    /// Replace the span every ledger operation is recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record `req.version` as the active deployment of its triple.
    ///
    /// Creates the application, environment, and region on first use. The
    /// previously active record (if any) becomes inactive and is recorded as
    /// the new record's rollback target.
    pub fn release(&self, req: &ReleaseRequest) -> LedgerResult<Deployment> {
        let _guard = self.span.enter();
        let req = &req.normalized();
        req.validate()?;
        let actor = self.actor(req.deployed_by.as_deref());

        let (deployment, superseded) = self.store.write(|txn| -> LedgerResult<_> {
            let application = txn.upsert_application(&req.application)?;
            let environment = txn.upsert_environment(&req.environment)?;
            let region = txn.upsert_region(&req.region, &req.region)?;
            let triple = Triple::new(application.id, environment.id, region.id);

            let history = txn.deployments(&DeploymentFilter::for_triple(triple))?;
            if history.iter().any(|d| d.version == req.version) {
                return Err(LedgerError::VersionExists {
                    application: req.application.clone(),
                    environment: req.environment.clone(),
                    region: req.region.clone(),
                    version: req.version.clone(),
                });
            }

            let mut previous = history.into_iter().find(Deployment::is_active);
            if let Some(prev) = previous.as_mut() {
                prev.status = DeploymentStatus::Inactive;
                txn.update_deployment(prev)?;
            }

            let deployment = txn.insert_deployment(NewDeployment {
                application,
                environment,
                region,
                version: req.version.clone(),
                deployed_by: actor,
                deployed_at: Utc::now(),
                rollback_target_id: previous.as_ref().map(|d| d.id),
            })?;
            Ok((deployment, previous.map(|d| d.version)))
        })?;

        info!(
            application = %deployment.application,
            environment = %deployment.environment,
            region = %deployment.region,
            version = %deployment.version,
            deployment_id = deployment.id,
            superseded = ?superseded,
            "released"
        );
        self.schedule_prune(deployment.triple());
        Ok(deployment)
    }

    /// Reactivate an earlier deployment of a triple.
    ///
    /// This swaps statuses of two existing records; no record is created.
    pub fn rollback(&self, req: &RollbackRequest) -> LedgerResult<Deployment> {
        let _guard = self.span.enter();
        let req = &req.normalized();
        req.validate()?;
        let actor = self.actor(req.deployed_by.as_deref());

        let (previous, target) = self.store.write(|txn| -> LedgerResult<_> {
            let triple = resolve_triple(&*txn, &req.application, &req.environment, &req.region)?;

            let active = txn.deployments(
                &DeploymentFilter::for_triple(triple).with_status(DeploymentStatus::Active),
            )?;
            let mut current = active
                .into_iter()
                .next()
                .ok_or(LedgerError::NoActiveDeployment)?;

            let history = txn.deployments(&DeploymentFilter::for_triple(triple))?;
            if history.len() < 2 {
                return Err(LedgerError::NoHistory);
            }

            let mut target = select_rollback_target(&history, &current, req.target_version())?
                .clone();

            current.status = DeploymentStatus::Inactive;
            txn.update_deployment(&current)?;
            target.status = DeploymentStatus::Active;
            target.deployed_by = actor;
            txn.update_deployment(&target)?;
            Ok((current, target))
        })?;

        info!(
            application = %target.application,
            environment = %target.environment,
            region = %target.region,
            from = %previous.version,
            to = %target.version,
            deployment_id = target.id,
            "rolled back"
        );
        Ok(target)
    }

    /// Apply the retention policy to one triple now. Returns the deleted records.
    pub fn prune(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> LedgerResult<Vec<Deployment>> {
        let _guard = self.span.enter();
        let triple = self
            .store
            .read(|view| resolve_triple(view, application, environment, region))?;
        self.prune_triple(triple)
    }

    fn prune_triple(&self, triple: Triple) -> LedgerResult<Vec<Deployment>> {
        let max_versions = self.config.max_versions;
        let deleted = self.store.write(|txn| -> LedgerResult<_> {
            let filter = DeploymentFilter::for_triple(triple);
            let history = txn.deployments(&filter)?;
            let doomed: HashSet<DeploymentId> =
                prune_candidates(&history, max_versions).into_iter().collect();
            if doomed.is_empty() {
                return Ok(Vec::new());
            }

            let doomed_only = |d: &Deployment| doomed.contains(&d.id);
            let deleted = txn.delete_deployments(&filter, &doomed_only)?;

            // Survivors must not point at deleted rows.
            for mut survivor in history.into_iter().filter(|d| !doomed.contains(&d.id)) {
                if survivor
                    .rollback_target_id
                    .is_some_and(|id| doomed.contains(&id))
                {
                    survivor.rollback_target_id = None;
                    txn.update_deployment(&survivor)?;
                }
            }
            Ok(deleted)
        })?;

        if !deleted.is_empty() {
            debug!(
                ?triple,
                count = deleted.len(),
                max_versions,
                "pruned old deployments"
            );
        }
        Ok(deleted)
    }

    /// Prune after a release without affecting the caller.
    ///
    /// Runs on the blocking pool when called inside a tokio runtime, inline
    /// otherwise. Failures are logged only.
    fn schedule_prune(&self, triple: Triple) {
        if self.config.max_versions == 0 {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ledger = self.clone();
                handle.spawn_blocking(move || ledger.prune_logged(triple));
            }
            Err(_) => self.prune_logged(triple),
        }
    }

    fn prune_logged(&self, triple: Triple) {
        let _guard = self.span.enter();
        if let Err(e) = self.prune_triple(triple) {
            warn!(?triple, error = %e, "failed to prune old deployments");
        }
    }

    fn actor(&self, given: Option<&str>) -> String {
        non_blank(given)
            .unwrap_or(&self.config.default_actor)
            .to_string()
    }
}

/// Choose the record a rollback reactivates.
///
/// `history` is the triple's records newest first and `current` its active
/// record. An explicit `version` wins; otherwise the active record's
/// rollback target; otherwise the newest record that is not active.
pub fn select_rollback_target<'a>(
    history: &'a [Deployment],
    current: &Deployment,
    version: Option<&str>,
) -> LedgerResult<&'a Deployment> {
    if let Some(version) = version {
        return history
            .iter()
            .find(|d| d.version == version && d.id != current.id)
            .ok_or_else(|| LedgerError::VersionNotFound(version.to_string()));
    }
    if let Some(target_id) = current.rollback_target_id {
        return history
            .iter()
            .find(|d| d.id == target_id)
            .ok_or(LedgerError::RollbackTargetMissing {
                deployment_id: current.id,
                target_id,
            });
    }
    history
        .iter()
        .find(|d| d.id != current.id)
        .ok_or(LedgerError::NoHistory)
}

/// Ids of the records the retention policy deletes.
///
/// `history` is one triple's records newest first. When it holds more than
/// `max_versions` records, the newest `max_versions` inactive records are
/// kept and the older inactive ones selected. Active records are never
/// selected. `max_versions == 0` disables pruning.
pub fn prune_candidates(history: &[Deployment], max_versions: usize) -> Vec<DeploymentId> {
    if max_versions == 0 || history.len() <= max_versions {
        return Vec::new();
    }
    history
        .iter()
        .filter(|d| !d.is_active())
        .skip(max_versions)
        .map(|d| d.id)
        .collect()
}
