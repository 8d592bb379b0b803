//! Test helpers for feedback-server unit tests.

use std::sync::Arc;

use feedback_core::modules::credentials::seed_credentials;
use feedback_core::MemoryStore;
use feedback_types::models::SeedCredential;
use feedback_types::{IngestConfig, PlanTier};

use crate::state::AppState;

pub const TEST_KEY: &str = "fk_test_0123456789abcdef";
pub const RESTRICTED_KEY: &str = "fk_test_restricted_0123456789";

/// Free tier: 5 requests / 10s, 3 responses per month, gated over quota.
pub fn test_config() -> IngestConfig {
    let mut config = IngestConfig::default();
    config.plans.free.rate_limit_requests = 5;
    config.plans.free.rate_limit_window_secs = 10;
    config.plans.free.monthly_responses = Some(3);
    config.plans.free.gate_over_quota = true;
    config.credentials = vec![
        SeedCredential {
            key: TEST_KEY.into(),
            tenant_id: "acme".into(),
            project_id: "web".into(),
            plan: PlanTier::Free,
            allowed_origins: vec![],
        },
        SeedCredential {
            key: RESTRICTED_KEY.into(),
            tenant_id: "acme".into(),
            project_id: "web".into(),
            plan: PlanTier::Pro,
            allowed_origins: vec!["https://acme.test".into()],
        },
    ];
    config
}

/// `AppState` over a seeded in-memory store.
pub async fn test_app_state(config: &IngestConfig) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    seed_credentials(store.as_ref(), &config.credentials)
        .await
        .expect("failed to seed test credentials");
    (AppState::new(store.clone(), config, None), store)
}
