//! Ingestion service configuration.

mod plans;

pub use plans::{PlanLimits, PlansConfig};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::credential::PlanTier;

/// Full service configuration, loaded from JSON and overridden by CLI/env.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct IngestConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on
    #[validate(range(min = 1_u16))]
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL URL; when unset the in-memory store is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Per-tier rate limits and monthly quotas
    #[serde(default)]
    #[validate(nested)]
    pub plans: PlansConfig,
    /// Idempotency cache settings
    #[serde(default)]
    #[validate(nested)]
    pub idempotency: IdempotencyConfig,
    /// Usage threshold notifications
    #[serde(default)]
    #[validate(nested)]
    pub notifications: NotificationConfig,
    /// Credentials seeded into the in-memory store at startup
    #[serde(default)]
    #[validate(nested)]
    pub credentials: Vec<SeedCredential>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            database_url: None,
            plans: PlansConfig::default(),
            idempotency: IdempotencyConfig::default(),
            notifications: NotificationConfig::default(),
            credentials: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Idempotency cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct IdempotencyConfig {
    /// How long a cached response is kept. Must outlive the client's full
    /// retry window.
    #[validate(range(min = 60_u64, max = 604800_u64))]
    #[serde(default = "default_idempotency_ttl")]
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self { ttl_secs: default_idempotency_ttl() }
    }
}

fn default_idempotency_ttl() -> u64 {
    24 * 60 * 60
}

/// Usage threshold notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct NotificationConfig {
    /// Percentages of the monthly quota that trigger a notification
    #[serde(default = "default_thresholds")]
    pub thresholds_percent: Vec<u32>,
    /// Optional webhook receiving threshold notifications
    #[validate(url)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { thresholds_percent: default_thresholds(), webhook_url: None }
    }
}

fn default_thresholds() -> Vec<u32> {
    vec![80, 100]
}

/// A raw credential to register at startup (in-memory store only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SeedCredential {
    #[validate(length(min = 16_u64))]
    pub key: String,
    #[validate(length(min = 1_u64))]
    pub tenant_id: String,
    #[validate(length(min = 1_u64))]
    pub project_id: String,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}
