//! redb table definitions for the Heirloom ledger store.
//!
//! Every table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types), so read and write paths can share one table type.

use redb::TableDefinition;

/// Applications keyed by `{name}`.
pub const APPLICATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("applications");

/// Environments keyed by `{name}`.
pub const ENVIRONMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("environments");

/// Regions keyed by `{code}`.
pub const REGIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("regions");

/// Deployment records keyed by `{application_id}:{environment_id}:{region_id}:{id}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Id sequences keyed by entity name; values are JSON `u64`.
pub const SEQUENCES: TableDefinition<&str, &[u8]> = TableDefinition::new("sequences");

pub const APPLICATION_SEQ: &str = "application";
pub const ENVIRONMENT_SEQ: &str = "environment";
pub const REGION_SEQ: &str = "region";
pub const DEPLOYMENT_SEQ: &str = "deployment";
