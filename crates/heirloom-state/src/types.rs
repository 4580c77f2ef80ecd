//! Domain types for the Heirloom ledger store.
//!
//! These types represent the persisted state of applications, environments,
//! regions, and deployment records. All types are serializable to/from JSON
//! for storage in redb tables.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an application.
pub type ApplicationId = u64;

/// Unique identifier for an environment.
pub type EnvironmentId = u64;

/// Unique identifier for a region.
pub type RegionId = u64;

/// Unique identifier for a deployment record.
pub type DeploymentId = u64;

// ── Targets ───────────────────────────────────────────────────────

/// An application/service that can be deployed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A deployment environment (e.g. `prod`, `staging`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A deployment region identified by its code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub code: String,
    /// Display name; equals the code unless set otherwise.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The (application, environment, region) key of one deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub application_id: ApplicationId,
    pub environment_id: EnvironmentId,
    pub region_id: RegionId,
}

impl Triple {
    pub fn new(
        application_id: ApplicationId,
        environment_id: EnvironmentId,
        region_id: RegionId,
    ) -> Self {
        Self {
            application_id,
            environment_id,
            region_id,
        }
    }

    /// Key prefix shared by every deployment of this triple.
    pub fn key_prefix(&self) -> String {
        format!(
            "{:016x}:{:016x}:{:016x}:",
            self.application_id, self.environment_id, self.region_id
        )
    }
}

// ── Deployments ───────────────────────────────────────────────────

/// Lifecycle status of a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Active,
    Inactive,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One released version of an application in an environment and region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub id: DeploymentId,
    pub application_id: ApplicationId,
    pub environment_id: EnvironmentId,
    pub region_id: RegionId,
    /// Application name.
    pub application: String,
    /// Environment name.
    pub environment: String,
    /// Region code.
    pub region: String,
    pub version: String,
    pub status: DeploymentStatus,
    pub deployed_by: String,
    pub deployed_at: DateTime<Utc>,
    /// Deployment this one reverts to on a rollback without explicit version.
    pub rollback_target_id: Option<DeploymentId>,
}

impl Deployment {
    pub fn triple(&self) -> Triple {
        Triple::new(self.application_id, self.environment_id, self.region_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }

    /// Build the composite key for the deployments table.
    pub fn table_key(&self) -> String {
        format!("{}{:016x}", self.triple().key_prefix(), self.id)
    }
}

/// A deployment record before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub application: Application,
    pub environment: Environment,
    pub region: Region,
    pub version: String,
    pub deployed_by: String,
    pub deployed_at: DateTime<Utc>,
    pub rollback_target_id: Option<DeploymentId>,
}

/// Orders deployments newest first: `deployed_at` descending, then `id`
/// descending so rows released within the same instant stay totally ordered.
pub fn newest_first(a: &Deployment, b: &Deployment) -> Ordering {
    b.deployed_at
        .cmp(&a.deployed_at)
        .then_with(|| b.id.cmp(&a.id))
}

// ── Queries ───────────────────────────────────────────────────────

/// Filter criteria for deployment queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentFilter {
    pub application_id: Option<ApplicationId>,
    pub environment_id: Option<EnvironmentId>,
    pub region_id: Option<RegionId>,
    pub status: Option<DeploymentStatus>,
}

impl DeploymentFilter {
    /// Create a filter matching every deployment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            application_id: None,
            environment_id: None,
            region_id: None,
            status: None,
        }
    }

    /// Match every deployment of one triple.
    #[must_use]
    pub fn for_triple(triple: Triple) -> Self {
        Self::new()
            .with_application(triple.application_id)
            .with_environment(triple.environment_id)
            .with_region(triple.region_id)
    }

    #[must_use]
    pub const fn with_application(mut self, id: ApplicationId) -> Self {
        self.application_id = Some(id);
        self
    }

    #[must_use]
    pub const fn with_environment(mut self, id: EnvironmentId) -> Self {
        self.environment_id = Some(id);
        self
    }

    #[must_use]
    pub const fn with_region(mut self, id: RegionId) -> Self {
        self.region_id = Some(id);
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: DeploymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Longest table-key prefix implied by this filter.
    pub fn key_prefix(&self) -> String {
        match (self.application_id, self.environment_id, self.region_id) {
            (Some(app), Some(env), Some(region)) => Triple::new(app, env, region).key_prefix(),
            (Some(app), Some(env), None) => format!("{app:016x}:{env:016x}:"),
            (Some(app), _, _) => format!("{app:016x}:"),
            _ => String::new(),
        }
    }

    pub fn matches(&self, d: &Deployment) -> bool {
        self.application_id.is_none_or(|id| id == d.application_id)
            && self.environment_id.is_none_or(|id| id == d.environment_id)
            && self.region_id.is_none_or(|id| id == d.region_id)
            && self.status.is_none_or(|s| s == d.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn deployment(id: DeploymentId, secs: i64) -> Deployment {
        Deployment {
            id,
            application_id: 1,
            environment_id: 2,
            region_id: 3,
            application: "svc".to_string(),
            environment: "prod".to_string(),
            region: "us-east".to_string(),
            version: format!("v{id}"),
            status: DeploymentStatus::Inactive,
            deployed_by: "system".to_string(),
            deployed_at: Utc.timestamp_opt(secs, 0).unwrap(),
            rollback_target_id: None,
        }
    }

    #[test]
    fn table_key_extends_triple_prefix() {
        let d = deployment(7, 1000);
        assert!(d.table_key().starts_with(&d.triple().key_prefix()));
        assert_eq!(d.table_key().len(), 4 * 16 + 3);
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let mut rows = vec![deployment(1, 1000), deployment(3, 1000), deployment(2, 2000)];
        rows.sort_by(newest_first);
        let ids: Vec<_> = rows.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn filter_prefix_narrows_with_known_ids() {
        assert_eq!(DeploymentFilter::new().key_prefix(), "");
        let app_only = DeploymentFilter::new().with_application(1);
        assert_eq!(app_only.key_prefix(), format!("{:016x}:", 1));
        // Region without environment cannot narrow past the application.
        let app_region = DeploymentFilter::new().with_application(1).with_region(3);
        assert_eq!(app_region.key_prefix(), format!("{:016x}:", 1));
        let triple = DeploymentFilter::for_triple(Triple::new(1, 2, 3));
        assert_eq!(triple.key_prefix(), Triple::new(1, 2, 3).key_prefix());
    }

    #[test]
    fn filter_matches_status_and_ids() {
        let d = deployment(1, 1000);
        assert!(DeploymentFilter::for_triple(d.triple()).matches(&d));
        assert!(!DeploymentFilter::new().with_region(9).matches(&d));
        assert!(!DeploymentFilter::new()
            .with_status(DeploymentStatus::Active)
            .matches(&d));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DeploymentStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }
}
