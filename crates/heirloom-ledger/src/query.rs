//! Read-side queries: history, live versions, summaries, and browsing.

use std::collections::{BTreeMap, HashSet};

use heirloom_state::{
    Application, Deployment, DeploymentFilter, DeploymentStatus, Environment, LedgerStore,
    LedgerView, Region, Triple,
};

use crate::error::{Entity, LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::views::{ActiveDeployment, DeploymentPage, FrontendDeployment, Pagination};

/// Default page size of [`Ledger::summaries`].
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Parameters of a cross-triple summary listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryQuery {
    /// Rows kept per triple; falls back to `page_size` when unset.
    pub limit: Option<usize>,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for SummaryQuery {
    fn default() -> Self {
        Self {
            limit: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SummaryQuery {
    /// Build a query, replacing zero values with defaults.
    pub fn new(limit: Option<usize>, page: Option<usize>, page_size: Option<usize>) -> Self {
        let defaults = Self::default();
        Self {
            limit: limit.filter(|&n| n > 0),
            page: page.filter(|&n| n > 0).unwrap_or(defaults.page),
            page_size: page_size.filter(|&n| n > 0).unwrap_or(defaults.page_size),
        }
    }

    /// Rows kept per triple before paging.
    pub fn per_group(&self) -> usize {
        self.limit.unwrap_or(self.page_size)
    }
}

/// Resolve natural keys to a triple, failing on the first unknown entity.
pub(crate) fn resolve_triple<V: LedgerView + ?Sized>(
    view: &V,
    application: &str,
    environment: &str,
    region: &str,
) -> LedgerResult<Triple> {
    let (application, environment, region) =
        (application.trim(), environment.trim(), region.trim());
    let application = view
        .application(application)?
        .ok_or_else(|| LedgerError::not_found(Entity::Application, application))?;
    let environment = view
        .environment(environment)?
        .ok_or_else(|| LedgerError::not_found(Entity::Environment, environment))?;
    let region = view
        .region(region)?
        .ok_or_else(|| LedgerError::not_found(Entity::Region, region))?;
    Ok(Triple::new(application.id, environment.id, region.id))
}

fn application_by_id<V: LedgerView + ?Sized>(view: &V, id: u64) -> LedgerResult<Application> {
    view.applications()?
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| LedgerError::not_found(Entity::Application, id))
}

fn environment_by_id<V: LedgerView + ?Sized>(view: &V, id: u64) -> LedgerResult<Environment> {
    view.environments()?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| LedgerError::not_found(Entity::Environment, id))
}

fn region_by_id<V: LedgerView + ?Sized>(view: &V, id: u64) -> LedgerResult<Region> {
    view.regions()?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| LedgerError::not_found(Entity::Region, id))
}

impl<S: LedgerStore> Ledger<S> {
    /// Every record of a triple, newest first.
    pub fn history(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> LedgerResult<Vec<Deployment>> {
        let _guard = self.span.enter();
        self.store.read(|view| {
            let triple = resolve_triple(view, application, environment, region)?;
            Ok(view.deployments(&DeploymentFilter::for_triple(triple))?)
        })
    }

    /// The active version of `application` in each environment and region.
    pub fn active_deployments(&self, application: &str) -> LedgerResult<Vec<ActiveDeployment>> {
        let _guard = self.span.enter();
        let application = application.trim();
        self.store.read(|view| {
            let app = view
                .application(application)?
                .ok_or_else(|| LedgerError::not_found(Entity::Application, application))?;
            let region_names: BTreeMap<u64, String> = view
                .regions()?
                .into_iter()
                .map(|r| (r.id, r.name))
                .collect();

            let mut active: Vec<ActiveDeployment> = view
                .deployments(
                    &DeploymentFilter::new()
                        .with_application(app.id)
                        .with_status(DeploymentStatus::Active),
                )?
                .into_iter()
                .map(|d| ActiveDeployment {
                    region_name: region_names
                        .get(&d.region_id)
                        .cloned()
                        .unwrap_or_else(|| d.region.clone()),
                    application_name: d.application,
                    environment: d.environment,
                    region_code: d.region,
                    version: d.version,
                    deployed_at: d.deployed_at,
                    deployed_by: d.deployed_by,
                })
                .collect();
            active.sort_by(|a, b| {
                a.region_code
                    .cmp(&b.region_code)
                    .then_with(|| a.environment.cmp(&b.environment))
            });
            Ok(active)
        })
    }

    /// Newest records of every triple, grouped and paged.
    pub fn summaries(&self, query: &SummaryQuery) -> LedgerResult<DeploymentPage> {
        let _guard = self.span.enter();
        let rows = self
            .store
            .read(|view| view.deployments(&DeploymentFilter::new()))?;

        let per_group = query.per_group();
        let mut groups: BTreeMap<(String, String, String), Vec<Deployment>> = BTreeMap::new();
        for d in rows {
            let group = groups
                .entry((d.application.clone(), d.environment.clone(), d.region.clone()))
                .or_default();
            if group.len() < per_group {
                group.push(d);
            }
        }

        let all: Vec<Deployment> = groups.into_values().flatten().collect();
        let total_count = all.len();
        let page_size = query.page_size.max(1);
        let page = query.page.max(1);
        let deployments = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(FrontendDeployment::from)
            .collect();

        Ok(DeploymentPage {
            deployments,
            pagination: Pagination {
                page,
                page_size,
                total_count,
                total_pages: total_count.div_ceil(page_size),
            },
        })
    }

    /// All known applications, ordered by name.
    pub fn applications(&self) -> LedgerResult<Vec<Application>> {
        let _guard = self.span.enter();
        self.store.read(|view| Ok(view.applications()?))
    }

    /// Regions where `application_id` has at least one record.
    pub fn regions_for_application(&self, application_id: u64) -> LedgerResult<Vec<Region>> {
        let _guard = self.span.enter();
        self.store.read(|view| {
            application_by_id(view, application_id)?;
            let used: HashSet<u64> = view
                .deployments(&DeploymentFilter::new().with_application(application_id))?
                .iter()
                .map(|d| d.region_id)
                .collect();
            Ok(view
                .regions()?
                .into_iter()
                .filter(|r| used.contains(&r.id))
                .collect())
        })
    }

    /// Environments where `application_id` has records in `region_id`.
    pub fn environments_for(
        &self,
        application_id: u64,
        region_id: u64,
    ) -> LedgerResult<Vec<Environment>> {
        let _guard = self.span.enter();
        self.store.read(|view| {
            application_by_id(view, application_id)?;
            region_by_id(view, region_id)?;
            let used: HashSet<u64> = view
                .deployments(
                    &DeploymentFilter::new()
                        .with_application(application_id)
                        .with_region(region_id),
                )?
                .iter()
                .map(|d| d.environment_id)
                .collect();
            Ok(view
                .environments()?
                .into_iter()
                .filter(|e| used.contains(&e.id))
                .collect())
        })
    }

    /// Every record of a triple addressed by ids, newest first.
    pub fn versions_for(
        &self,
        application_id: u64,
        environment_id: u64,
        region_id: u64,
    ) -> LedgerResult<Vec<Deployment>> {
        let _guard = self.span.enter();
        self.store.read(|view| {
            application_by_id(view, application_id)?;
            environment_by_id(view, environment_id)?;
            region_by_id(view, region_id)?;
            let triple = Triple::new(application_id, environment_id, region_id);
            Ok(view.deployments(&DeploymentFilter::for_triple(triple))?)
        })
    }
}
