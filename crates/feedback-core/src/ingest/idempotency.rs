//! Idempotency cache: project-scoped key → response body, bounded TTL.
//!
//! The cache is an optimisation in front of the unique
//! `(project_id, idempotency_key)` constraint on stored responses. Lookup
//! failures read as a fresh key and write failures are only logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use feedback_types::SubmitResponse;

use crate::ingest::prometheus;
use crate::modules::repository::{IngestStore, StoreError, StoreResult};

/// Result of an idempotency lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyCheck {
    /// Unseen (or expired) key; the submission proceeds
    Fresh,
    /// Key already answered; the cached body is re-tagged `duplicate`
    Duplicate(SubmitResponse),
}

impl IdempotencyCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    pub fn cached_response(&self) -> Option<&SubmitResponse> {
        match self {
            Self::Duplicate(body) => Some(body),
            Self::Fresh => None,
        }
    }
}

#[derive(Clone)]
pub struct IdempotencyCache {
    store: Arc<dyn IngestStore>,
    ttl: chrono::Duration,
}

impl IdempotencyCache {
    pub fn new(store: Arc<dyn IngestStore>, ttl_secs: u64) -> Self {
        Self { store, ttl: chrono::Duration::seconds(ttl_secs as i64) }
    }

    /// Cache key namespaced by project so tenants never collide.
    pub fn scoped_key(project_id: &str, key: &str) -> String {
        format!("{}:{}", project_id, key)
    }

    pub async fn check_idempotency(&self, project_id: &str, key: &str) -> IdempotencyCheck {
        self.check_idempotency_at(project_id, key, Utc::now()).await
    }

    pub async fn check_idempotency_at(
        &self,
        project_id: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> IdempotencyCheck {
        let scoped = Self::scoped_key(project_id, key);
        let cached = match self.store.get_idempotency(&scoped, now).await {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(key = %scoped, error = %err, "Idempotency lookup failed; treating as fresh");
                prometheus::record_idempotency("error");
                return IdempotencyCheck::Fresh;
            },
        };

        let Some(value) = cached else {
            prometheus::record_idempotency("miss");
            return IdempotencyCheck::Fresh;
        };

        match serde_json::from_value::<SubmitResponse>(value) {
            Ok(body) => {
                prometheus::record_idempotency("hit");
                IdempotencyCheck::Duplicate(body.as_duplicate())
            },
            Err(err) => {
                tracing::warn!(key = %scoped, error = %err, "Unreadable idempotency record; treating as fresh");
                prometheus::record_idempotency("error");
                IdempotencyCheck::Fresh
            },
        }
    }

    /// Store the body answered for `key`. Returns `false` when a live record
    /// already exists (first writer wins).
    pub async fn cache_response(
        &self,
        project_id: &str,
        key: &str,
        body: &SubmitResponse,
    ) -> StoreResult<bool> {
        let now = Utc::now();
        let value = serde_json::to_value(body)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.store
            .put_idempotency(&Self::scoped_key(project_id, key), value, now, now + self.ttl)
            .await
    }

    /// Cache in a detached task; failures are logged and never reach the caller.
    pub fn cache_response_detached(&self, project_id: &str, key: &str, body: SubmitResponse) {
        let cache = self.clone();
        let project_id = project_id.to_string();
        let key = key.to_string();
        tokio::spawn(async move {
            match cache.cache_response(&project_id, &key, &body).await {
                Ok(true) => tracing::debug!(project_id = %project_id, key = %key, "Cached idempotent response"),
                Ok(false) => tracing::debug!(project_id = %project_id, key = %key, "Idempotency record already present"),
                Err(err) => tracing::warn!(
                    project_id = %project_id,
                    key = %key,
                    error = %err,
                    "Failed to cache idempotent response"
                ),
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::MemoryStore;
    use feedback_types::SubmissionStatus;
    use uuid::Uuid;

    fn body() -> SubmitResponse {
        SubmitResponse { id: Uuid::new_v4(), status: SubmissionStatus::Created, created_at: Utc::now() }
    }

    #[tokio::test]
    async fn test_hit_is_tagged_duplicate() {
        let cache = IdempotencyCache::new(Arc::new(MemoryStore::new()), 3600);
        let original = body();

        assert_eq!(cache.check_idempotency("p1", "k").await, IdempotencyCheck::Fresh);
        assert!(cache.cache_response("p1", "k", &original).await.unwrap());

        let check = cache.check_idempotency("p1", "k").await;
        let cached = check.cached_response().unwrap();
        assert_eq!(cached.id, original.id);
        assert_eq!(cached.status, SubmissionStatus::Duplicate);
        assert_eq!(cached.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_keys_are_project_scoped() {
        let cache = IdempotencyCache::new(Arc::new(MemoryStore::new()), 3600);
        cache.cache_response("p1", "k", &body()).await.unwrap();
        assert!(!cache.check_idempotency("p2", "k").await.is_duplicate());
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let cache = IdempotencyCache::new(Arc::new(MemoryStore::new()), 3600);
        let first = body();
        assert!(cache.cache_response("p1", "k", &first).await.unwrap());
        assert!(!cache.cache_response("p1", "k", &body()).await.unwrap());
        assert_eq!(cache.check_idempotency("p1", "k").await.cached_response().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_fresh() {
        let cache = IdempotencyCache::new(Arc::new(MemoryStore::new()), 60);
        cache.cache_response("p1", "k", &body()).await.unwrap();
        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(cache.check_idempotency_at("p1", "k", later).await, IdempotencyCheck::Fresh);
    }
}
