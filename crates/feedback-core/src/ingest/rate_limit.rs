//! Per-credential fixed-window rate limiter, ceiling scaled by plan tier.
//!
//! The window opens on the first request and closes `window_secs` later. The
//! count-and-compare is a single atomic store operation so concurrent requests
//! for one credential never overshoot the ceiling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use feedback_types::models::PlansConfig;
use feedback_types::{IngestError, PlanTier, RateLimitInfo};
use uuid::Uuid;

use crate::ingest::prometheus;
use crate::modules::repository::{IngestStore, RateWindow};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub info: RateLimitInfo,
}

impl RateLimitDecision {
    pub fn into_result(self) -> Result<RateLimitInfo, IngestError> {
        if self.success {
            Ok(self.info)
        } else {
            Err(IngestError::RateLimited { info: self.info })
        }
    }
}

/// Header pairs for `info`.
pub fn rate_limit_headers(info: &RateLimitInfo, limited: bool) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        (HEADER_LIMIT, info.limit.to_string()),
        (HEADER_REMAINING, info.remaining.to_string()),
        (HEADER_RESET, info.reset_at.to_string()),
    ];
    if limited {
        headers.push((HEADER_RETRY_AFTER, info.retry_after_secs.to_string()));
    }
    headers
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn IngestStore>,
    plans: PlansConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn IngestStore>, plans: PlansConfig) -> Self {
        Self { store, plans }
    }

    pub async fn check_rate_limit(&self, credential_id: Uuid, plan: PlanTier) -> RateLimitDecision {
        self.check_rate_limit_at(credential_id, plan, Utc::now()).await
    }

    pub async fn check_rate_limit_at(
        &self,
        credential_id: Uuid,
        plan: PlanTier,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let limits = self.plans.for_tier(plan);
        let limit = limits.rate_limit_requests;
        let window = chrono::Duration::seconds(limits.rate_limit_window_secs as i64);

        let hit = match self.store.hit_rate_window(credential_id, window, now).await {
            Ok(hit) => hit,
            Err(err) => {
                // Fail open: an unavailable counter store must not block ingestion.
                tracing::warn!(
                    credential_id = %credential_id,
                    error = %err,
                    "Rate limit check failed; allowing request"
                );
                return RateLimitDecision {
                    success: true,
                    info: RateLimitInfo {
                        limit,
                        remaining: limit,
                        reset_at: (now + window).timestamp(),
                        retry_after_secs: 0,
                    },
                };
            },
        };

        let decision = decide(limit, hit, now);
        if !decision.success {
            prometheus::record_rate_limited();
            tracing::debug!(
                credential_id = %credential_id,
                plan = %plan,
                retry_after = decision.info.retry_after_secs,
                "Rate limited"
            );
        }
        decision
    }
}

fn decide(limit: u32, hit: RateWindow, now: DateTime<Utc>) -> RateLimitDecision {
    let success = hit.count <= u64::from(limit);
    let remaining = u64::from(limit).saturating_sub(hit.count) as u32;
    let retry_after_secs = if success {
        0
    } else {
        let millis = (hit.reset_at - now).num_milliseconds().max(0);
        ((millis + 999) / 1000) as u64
    };
    RateLimitDecision {
        success,
        info: RateLimitInfo { limit, remaining, reset_at: hit.reset_at.timestamp(), retry_after_secs },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::MemoryStore;

    fn limiter(requests: u32, window_secs: u64) -> RateLimiter {
        let mut plans = PlansConfig::default();
        plans.free.rate_limit_requests = requests;
        plans.free.rate_limit_window_secs = window_secs;
        RateLimiter::new(Arc::new(MemoryStore::new()), plans)
    }

    #[tokio::test]
    async fn test_sixth_request_in_window_is_limited() {
        let limiter = limiter(5, 10);
        let credential = Uuid::new_v4();
        let start = Utc::now();

        for i in 0..5 {
            let at = start + chrono::Duration::seconds(i);
            let decision = limiter.check_rate_limit_at(credential, PlanTier::Free, at).await;
            assert!(decision.success);
            assert_eq!(decision.info.remaining, 4 - i as u32);
        }

        let at = start + chrono::Duration::milliseconds(5500);
        let decision = limiter.check_rate_limit_at(credential, PlanTier::Free, at).await;
        assert!(!decision.success);
        assert_eq!(decision.info.remaining, 0);
        assert_eq!(decision.info.retry_after_secs, 5);

        let err = decision.into_result().unwrap_err();
        assert_eq!(err.http_status_code(), 429);
    }

    #[tokio::test]
    async fn test_window_reopens_after_reset() {
        let limiter = limiter(1, 10);
        let credential = Uuid::new_v4();
        let start = Utc::now();

        assert!(limiter.check_rate_limit_at(credential, PlanTier::Free, start).await.success);
        assert!(!limiter.check_rate_limit_at(credential, PlanTier::Free, start).await.success);

        let later = start + chrono::Duration::seconds(10);
        assert!(limiter.check_rate_limit_at(credential, PlanTier::Free, later).await.success);
    }

    #[tokio::test]
    async fn test_credentials_have_independent_windows() {
        let limiter = limiter(1, 10);
        let now = Utc::now();
        assert!(limiter.check_rate_limit_at(Uuid::new_v4(), PlanTier::Free, now).await.success);
        assert!(limiter.check_rate_limit_at(Uuid::new_v4(), PlanTier::Free, now).await.success);
    }

    #[test]
    fn test_headers_include_retry_after_only_when_limited() {
        let info = RateLimitInfo { limit: 5, remaining: 0, reset_at: 1_700_000_000, retry_after_secs: 3 };
        let ok = rate_limit_headers(&info, false);
        assert_eq!(ok.len(), 3);
        let limited = rate_limit_headers(&info, true);
        assert!(limited.contains(&(HEADER_RETRY_AFTER, "3".to_string())));
    }
}
