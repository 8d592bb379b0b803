//! Plan tier limits.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::credential::PlanTier;

/// Limits applied to every credential of a tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PlanLimits {
    /// Requests allowed per credential per window
    #[validate(range(min = 1_u32))]
    pub rate_limit_requests: u32,
    /// Window length in seconds
    #[validate(range(min = 1_u64, max = 86400_u64))]
    pub rate_limit_window_secs: u64,
    /// Monthly response quota; `None` is unlimited
    #[serde(default)]
    pub monthly_responses: Option<u64>,
    /// Persist over-quota responses as gated instead of visible
    #[serde(default)]
    pub gate_over_quota: bool,
    /// Monthly count beyond which creates are rejected outright
    #[serde(default)]
    pub hard_limit: Option<u64>,
}

impl PlanLimits {
    /// Whether `count` responses this month exceeds the quota.
    pub fn is_over_quota(&self, count: u64) -> bool {
        self.monthly_responses.is_some_and(|limit| count > limit)
    }

    /// Whether the response that brought the counter to `count` is gated.
    pub fn should_gate(&self, count: u64) -> bool {
        self.gate_over_quota && self.is_over_quota(count)
    }

    /// Whether a new create must be rejected given the current count.
    pub fn is_hard_blocked(&self, current_count: u64) -> bool {
        self.hard_limit.is_some_and(|limit| current_count >= limit)
    }
}

/// Limits for each tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PlansConfig {
    #[validate(nested)]
    pub free: PlanLimits,
    #[validate(nested)]
    pub pro: PlanLimits,
    #[validate(nested)]
    pub business: PlanLimits,
    #[validate(nested)]
    pub enterprise: PlanLimits,
}

impl PlansConfig {
    pub fn for_tier(&self, tier: PlanTier) -> &PlanLimits {
        match tier {
            PlanTier::Free => &self.free,
            PlanTier::Pro => &self.pro,
            PlanTier::Business => &self.business,
            PlanTier::Enterprise => &self.enterprise,
        }
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: PlanLimits {
                rate_limit_requests: 10,
                rate_limit_window_secs: 10,
                monthly_responses: Some(1_000),
                gate_over_quota: true,
                hard_limit: None,
            },
            pro: PlanLimits {
                rate_limit_requests: 60,
                rate_limit_window_secs: 10,
                monthly_responses: Some(25_000),
                gate_over_quota: false,
                hard_limit: None,
            },
            business: PlanLimits {
                rate_limit_requests: 300,
                rate_limit_window_secs: 10,
                monthly_responses: Some(250_000),
                gate_over_quota: false,
                hard_limit: None,
            },
            enterprise: PlanLimits {
                rate_limit_requests: 1_000,
                rate_limit_window_secs: 10,
                monthly_responses: None,
                gate_over_quota: false,
                hard_limit: None,
            },
        }
    }
}
