//! Monthly usage counter.
//!
//! `atomic_increment_usage` rolls the counter over and increments it in a
//! single store operation. Rollover moves `reset_at` to the first instant of
//! the next calendar month (UTC).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use feedback_types::models::next_billing_reset;
use feedback_types::UsageCounter;

use crate::modules::repository::{IngestStore, StoreResult};

#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn IngestStore>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn IngestStore>) -> Self {
        Self { store }
    }

    /// Count as of `now`; a counter past its reset reads as zero.
    pub async fn current_count(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self
            .store
            .get_usage(tenant_id)
            .await?
            .map_or(0, |counter| counter.effective_count(now)))
    }

    pub async fn atomic_increment_usage(&self, tenant_id: &str) -> StoreResult<UsageCounter> {
        self.atomic_increment_usage_at(tenant_id, Utc::now()).await
    }

    /// Returns the counter after the increment, the authoritative count for
    /// the response that caused it.
    pub async fn atomic_increment_usage_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<UsageCounter> {
        let counter = self.store.increment_usage(tenant_id, now, next_billing_reset(now)).await?;
        tracing::debug!(
            tenant_id = %tenant_id,
            count = counter.responses_this_month,
            reset_at = %counter.reset_at,
            "Usage incremented"
        );
        Ok(counter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::MemoryStore;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_first_increment_sets_next_month_reset() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()));
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();

        let counter = tracker.atomic_increment_usage_at("t1", now).await.unwrap();
        assert_eq!(counter.responses_this_month, 1);
        assert_eq!(counter.reset_at, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_rollover_resets_and_advances() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()));
        let march = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        for _ in 0..3 {
            tracker.atomic_increment_usage_at("t1", march).await.unwrap();
        }
        assert_eq!(tracker.current_count("t1", march).await.unwrap(), 3);

        let april = Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap();
        assert_eq!(tracker.current_count("t1", april).await.unwrap(), 0);

        let counter = tracker.atomic_increment_usage_at("t1", april).await.unwrap();
        assert_eq!(counter.responses_this_month, 1);
        assert_eq!(counter.reset_at, Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_tenant_reads_zero() {
        let tracker = UsageTracker::new(Arc::new(MemoryStore::new()));
        assert_eq!(tracker.current_count("nobody", Utc::now()).await.unwrap(), 0);
    }
}
