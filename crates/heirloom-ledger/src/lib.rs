//! heirloom-ledger — deployment ledger for Heirloom.
//!
//! Records which version of an application is active in each
//! (application, environment, region) triple and owns every status
//! transition of a deployment record.
//!
//! # Components
//!
//! - **`ledger`** — release, rollback, and retention pruning
//! - **`query`** — history, active deployments, paginated summaries, browse queries
//! - **`request`** — validated release/rollback requests
//! - **`config`** — retention count and default actor
//!
//! # Deployment lifecycle
//!
//! A record is created `active` by a release. It becomes `inactive` when a
//! later release or a rollback supersedes it, and may become `active` again
//! as a rollback target. Retention pruning hard-deletes old inactive records
//! and never touches the active one.

pub mod config;
pub mod error;
pub mod ledger;
pub mod query;
pub mod request;
pub mod views;

pub use config::LedgerConfig;
pub use error::{Entity, ErrorKind, LedgerError, LedgerResult};
pub use ledger::{Ledger, prune_candidates, select_rollback_target};
pub use query::SummaryQuery;
pub use request::{ReleaseRequest, RollbackRequest};
pub use views::{ActiveDeployment, DeploymentPage, FrontendDeployment, Pagination};
