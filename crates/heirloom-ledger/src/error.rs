//! Error types for the deployment ledger.

use heirloom_state::{DeploymentId, StateError};
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which target entity a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Application,
    Environment,
    Region,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Application => "application",
            Self::Environment => "environment",
            Self::Region => "region",
        })
    }
}

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    #[error("version {version} already exists for {application}/{environment}/{region}")]
    VersionExists {
        application: String,
        environment: String,
        region: String,
        version: String,
    },

    #[error("no active deployment found to roll back")]
    NoActiveDeployment,

    #[error("no previous deployments found to roll back to")]
    NoHistory,

    #[error("no deployment found with version {0}")]
    VersionNotFound(String),

    #[error("rollback target {target_id} of deployment {deployment_id} is missing")]
    RollbackTargetMissing {
        deployment_id: DeploymentId,
        target_id: DeploymentId,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StateError),
}

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is incomplete.
    Validation,
    /// A named application, environment, region, or version does not exist.
    NotFound,
    /// The request conflicts with the ledger's current state.
    Conflict,
    /// The ledger's data violates an integrity rule.
    State,
    /// The storage layer failed.
    Storage,
}

impl LedgerError {
    pub(crate) fn not_found(entity: Entity, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingFields(_) => ErrorKind::Validation,
            Self::NotFound { .. } | Self::VersionNotFound(_) => ErrorKind::NotFound,
            Self::VersionExists { .. } | Self::NoActiveDeployment | Self::NoHistory => {
                ErrorKind::Conflict
            }
            Self::RollbackTargetMissing { .. } => ErrorKind::State,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = LedgerError::MissingFields(vec!["application", "version"]);
        assert_eq!(err.to_string(), "missing required fields: application, version");

        let err = LedgerError::not_found(Entity::Region, "mars-1");
        assert_eq!(err.to_string(), "region not found: mars-1");
    }

    #[test]
    fn kinds_classify_variants() {
        assert_eq!(LedgerError::NoHistory.kind(), ErrorKind::Conflict);
        assert_eq!(
            LedgerError::VersionNotFound("v9".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::Storage(StateError::Write("disk".into())).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            LedgerError::RollbackTargetMissing {
                deployment_id: 2,
                target_id: 1
            }
            .kind(),
            ErrorKind::State
        );
    }
}
