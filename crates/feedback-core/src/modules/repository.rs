//! Ingest store trait for storage abstraction.
//!
//! All cross-request state (credentials, idempotency records, rate-limit
//! windows, usage counters, responses) lives behind this trait. Every counter
//! mutation is a single atomic operation on the backend; callers never
//! read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use feedback_types::{Credential, FeedbackResponse, ResponsePatch, UsageCounter};

/// Unique constraint hit by `insert_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `(project_id, idempotency_key)` already stored
    IdempotencyKey,
    /// `(project_id, element_id, end_user_id)` already stored
    ElementUser,
}

/// State of a credential's rate-limit window after an atomic hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0:?}")]
    Conflict(ConflictKind),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for feedback_types::IngestError {
    fn from(err: StoreError) -> Self {
        Self::internal(err.to_string())
    }
}

#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Register or refresh a credential under its key digest.
    async fn upsert_credential(&self, key_hash: &str, credential: &Credential)
        -> StoreResult<Credential>;
    async fn find_credential(&self, key_hash: &str) -> StoreResult<Option<Credential>>;
    async fn touch_credential(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Cached body for `key` if present and unexpired at `now`.
    async fn get_idempotency(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<serde_json::Value>>;
    /// Write-once: returns `false` if an unexpired record already exists.
    async fn put_idempotency(
        &self,
        key: &str,
        body: serde_json::Value,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    /// Delete idempotency records expired at `now`; returns how many.
    async fn purge_idempotency(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Atomically count one request in the credential's window, opening a
    /// fresh window of length `window` when the previous one has ended.
    async fn hit_rate_window(
        &self,
        credential_id: Uuid,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<RateWindow>;

    async fn get_usage(&self, tenant_id: &str) -> StoreResult<Option<UsageCounter>>;
    /// Atomically roll over (when `now >= reset_at`) and increment by one.
    async fn increment_usage(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> StoreResult<UsageCounter>;

    /// Insert a new response, enforcing both unique constraints.
    async fn insert_response(&self, response: &FeedbackResponse) -> StoreResult<()>;
    async fn get_response(&self, id: Uuid) -> StoreResult<Option<FeedbackResponse>>;
    async fn find_by_element_user(
        &self,
        project_id: &str,
        element_id: &str,
        end_user_id: &str,
    ) -> StoreResult<Option<FeedbackResponse>>;
    async fn find_by_idempotency_key(
        &self,
        project_id: &str,
        idempotency_key: &str,
    ) -> StoreResult<Option<FeedbackResponse>>;
    /// Overwrite mutable fields in place; `None` if the row does not exist.
    async fn update_response(
        &self,
        id: Uuid,
        patch: &ResponsePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FeedbackResponse>>;
    async fn set_gated(&self, id: Uuid, gated: bool) -> StoreResult<()>;
    async fn count_responses(&self, project_id: &str) -> StoreResult<u64>;
}
