//! Credential model and plan tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Billing tier of a tenant. Selects rate-limit and quota ceilings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Business,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown plan tier: {}", other)),
        }
    }
}

/// An API credential issued to a project.
///
/// Immutable except for revocation and `last_used_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub tenant_id: String,
    pub project_id: String,
    pub plan: PlanTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Browser origins allowed to use this credential. Empty allows any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Credential {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check a request `Origin` against the allow-list.
    ///
    /// Requests without an origin (server-to-server) are always allowed.
    pub fn allows_origin(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        if self.allowed_origins.is_empty() {
            return true;
        }
        let origin = origin.trim_end_matches('/');
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed.trim_end_matches('/').eq_ignore_ascii_case(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(origins: &[&str]) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            tenant_id: "tenant-1".to_string(),
            project_id: "project-1".to_string(),
            plan: PlanTier::Free,
            revoked_at: None,
            last_used_at: None,
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn test_allows_origin() {
        let cred = credential(&["https://app.example.com/"]);
        assert!(cred.allows_origin(Some("https://app.example.com")));
        assert!(cred.allows_origin(Some("HTTPS://APP.EXAMPLE.COM")));
        assert!(!cred.allows_origin(Some("https://evil.example.com")));
        assert!(cred.allows_origin(None));
    }

    #[test]
    fn test_empty_and_wildcard_origins() {
        assert!(credential(&[]).allows_origin(Some("https://anything.test")));
        assert!(credential(&["*"]).allows_origin(Some("https://anything.test")));
    }

    #[test]
    fn test_plan_tier_parse() {
        assert_eq!("Business".parse::<PlanTier>(), Ok(PlanTier::Business));
        assert!("platinum".parse::<PlanTier>().is_err());
        assert_eq!(PlanTier::Enterprise.to_string(), "enterprise");
    }
}
