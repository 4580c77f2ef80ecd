//! Read models returned by ledger queries.

use chrono::{DateTime, SecondsFormat, Utc};
use heirloom_state::{Deployment, DeploymentStatus};
use serde::{Deserialize, Serialize};

/// The live version of an application in one environment and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDeployment {
    pub application_name: String,
    pub environment: String,
    pub region_code: String,
    pub region_name: String,
    pub version: String,
    pub deployed_at: DateTime<Utc>,
    pub deployed_by: String,
}

/// Flattened deployment row for cross-triple listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendDeployment {
    pub application_name: String,
    pub environment: String,
    pub region: String,
    pub version: String,
    /// RFC3339 `deployed_at`.
    pub timestamp: String,
    pub status: DeploymentStatus,
    pub deployed_by: String,
}

impl From<Deployment> for FrontendDeployment {
    fn from(d: Deployment) -> Self {
        Self {
            application_name: d.application,
            environment: d.environment,
            region: d.region,
            version: d.version,
            timestamp: d.deployed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: d.status,
            deployed_by: d.deployed_by,
        }
    }
}

/// Pagination metadata of a [`DeploymentPage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

/// One page of a cross-triple deployment listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPage {
    pub deployments: Vec<FrontendDeployment>,
    pub pagination: Pagination,
}
