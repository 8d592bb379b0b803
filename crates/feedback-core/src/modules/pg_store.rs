//! PostgreSQL implementation of the ingest store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use feedback_types::{Credential, FeedbackResponse, ResponsePatch, UsageCounter};

use crate::modules::pg_store_counters::{
    find_credential_impl, get_idempotency_impl, get_usage_impl, hit_rate_window_impl,
    increment_usage_impl, purge_idempotency_impl, put_idempotency_impl, touch_credential_impl,
    upsert_credential_impl,
};
use crate::modules::pg_store_responses::{
    count_responses_impl, find_by_element_user_impl, find_by_idempotency_key_impl,
    get_response_impl, insert_response_impl, set_gated_impl, update_response_impl,
};
use crate::modules::repository::{IngestStore, RateWindow, StoreError, StoreResult};

/// PostgreSQL-backed ingest store.
pub struct PostgresIngestStore {
    /// Database connection pool.
    pool: PgPool,
}

impl PostgresIngestStore {
    /// Create store with existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to database and create store.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Database(err.to_string()))
    }
}

#[async_trait]
impl IngestStore for PostgresIngestStore {
    async fn upsert_credential(
        &self,
        key_hash: &str,
        credential: &Credential,
    ) -> StoreResult<Credential> {
        upsert_credential_impl(&self.pool, key_hash, credential).await
    }

    async fn find_credential(&self, key_hash: &str) -> StoreResult<Option<Credential>> {
        find_credential_impl(&self.pool, key_hash).await
    }

    async fn touch_credential(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        touch_credential_impl(&self.pool, id, at).await
    }

    async fn get_idempotency(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<serde_json::Value>> {
        get_idempotency_impl(&self.pool, key, now).await
    }

    async fn put_idempotency(
        &self,
        key: &str,
        body: serde_json::Value,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        put_idempotency_impl(&self.pool, key, body, now, expires_at).await
    }

    async fn purge_idempotency(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        purge_idempotency_impl(&self.pool, now).await
    }

    async fn hit_rate_window(
        &self,
        credential_id: Uuid,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<RateWindow> {
        hit_rate_window_impl(&self.pool, credential_id, window, now).await
    }

    async fn get_usage(&self, tenant_id: &str) -> StoreResult<Option<UsageCounter>> {
        get_usage_impl(&self.pool, tenant_id).await
    }

    async fn increment_usage(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> StoreResult<UsageCounter> {
        increment_usage_impl(&self.pool, tenant_id, now, next_reset).await
    }

    async fn insert_response(&self, response: &FeedbackResponse) -> StoreResult<()> {
        insert_response_impl(&self.pool, response).await
    }

    async fn get_response(&self, id: Uuid) -> StoreResult<Option<FeedbackResponse>> {
        get_response_impl(&self.pool, id).await
    }

    async fn find_by_element_user(
        &self,
        project_id: &str,
        element_id: &str,
        end_user_id: &str,
    ) -> StoreResult<Option<FeedbackResponse>> {
        find_by_element_user_impl(&self.pool, project_id, element_id, end_user_id).await
    }

    async fn find_by_idempotency_key(
        &self,
        project_id: &str,
        idempotency_key: &str,
    ) -> StoreResult<Option<FeedbackResponse>> {
        find_by_idempotency_key_impl(&self.pool, project_id, idempotency_key).await
    }

    async fn update_response(
        &self,
        id: Uuid,
        patch: &ResponsePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FeedbackResponse>> {
        update_response_impl(&self.pool, id, patch, now).await
    }

    async fn set_gated(&self, id: Uuid, gated: bool) -> StoreResult<()> {
        set_gated_impl(&self.pool, id, gated).await
    }

    async fn count_responses(&self, project_id: &str) -> StoreResult<u64> {
        count_responses_impl(&self.pool, project_id).await
    }
}
