//! Release and rollback request payloads.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Request to record a new active version for a triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseRequest {
    pub application: String,
    pub environment: String,
    pub region: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
}

/// Request to reactivate an earlier version of a triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackRequest {
    pub application: String,
    pub environment: String,
    pub region: String,
    /// Version to roll back to; the rollback target or previous version if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
}

impl ReleaseRequest {
    pub fn new(application: &str, environment: &str, region: &str, version: &str) -> Self {
        Self {
            application: application.to_string(),
            environment: environment.to_string(),
            region: region.to_string(),
            version: version.to_string(),
            deployed_by: None,
        }
    }

    #[must_use]
    pub fn deployed_by(mut self, actor: &str) -> Self {
        self.deployed_by = Some(actor.to_string());
        self
    }

    /// Copy with surrounding whitespace stripped from every field.
    pub fn normalized(&self) -> Self {
        Self {
            application: self.application.trim().to_string(),
            environment: self.environment.trim().to_string(),
            region: self.region.trim().to_string(),
            version: self.version.trim().to_string(),
            deployed_by: trimmed(self.deployed_by.as_deref()),
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        require(&[
            ("application", &self.application),
            ("environment", &self.environment),
            ("region", &self.region),
            ("version", &self.version),
        ])
    }
}

impl RollbackRequest {
    pub fn new(application: &str, environment: &str, region: &str) -> Self {
        Self {
            application: application.to_string(),
            environment: environment.to_string(),
            region: region.to_string(),
            version: None,
            deployed_by: None,
        }
    }

    #[must_use]
    pub fn to_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    #[must_use]
    pub fn deployed_by(mut self, actor: &str) -> Self {
        self.deployed_by = Some(actor.to_string());
        self
    }

    /// Requested version, treating a blank string as none.
    pub fn target_version(&self) -> Option<&str> {
        non_blank(self.version.as_deref())
    }

    /// Copy with surrounding whitespace stripped from every field.
    pub fn normalized(&self) -> Self {
        Self {
            application: self.application.trim().to_string(),
            environment: self.environment.trim().to_string(),
            region: self.region.trim().to_string(),
            version: trimmed(self.version.as_deref()),
            deployed_by: trimmed(self.deployed_by.as_deref()),
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        require(&[
            ("application", &self.application),
            ("environment", &self.environment),
            ("region", &self.region),
        ])
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn require(fields: &[(&'static str, &String)]) -> LedgerResult<()> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::MissingFields(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_requires_every_field() {
        let req = ReleaseRequest::new("svc", " ", "us-east", "");
        match req.validate() {
            Err(LedgerError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["environment", "version"]);
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
        assert!(ReleaseRequest::new("svc", "prod", "us-east", "v1").validate().is_ok());
    }

    #[test]
    fn rollback_version_is_optional() {
        let req = RollbackRequest::new("svc", "prod", "us-east");
        assert!(req.validate().is_ok());
        assert_eq!(req.target_version(), None);
        assert_eq!(req.clone().to_version("  ").target_version(), None);
        assert_eq!(req.to_version("v1").target_version(), Some("v1"));
    }

    #[test]
    fn normalized_strips_whitespace() {
        let req =
            ReleaseRequest::new(" svc ", "prod\t", "\nus-east", " v1").deployed_by(" alice ");
        assert_eq!(
            req.normalized(),
            ReleaseRequest::new("svc", "prod", "us-east", "v1").deployed_by("alice")
        );

        let req = RollbackRequest::new("svc ", " prod", "us-east").to_version(" v1 ");
        assert_eq!(
            req.normalized(),
            RollbackRequest::new("svc", "prod", "us-east").to_version("v1")
        );
    }

    #[test]
    fn missing_json_fields_deserialize_empty() {
        let req: ReleaseRequest = serde_json::from_str(r#"{"application":"svc"}"#).unwrap();
        assert_eq!(req.environment, "");
        assert!(req.deployed_by.is_none());
        assert!(req.validate().is_err());
    }
}
