//! Credentials, idempotency records, and atomic counters for PostgreSQL.
//!
//! Counter mutations are single `INSERT .. ON CONFLICT DO UPDATE .. RETURNING`
//! statements, so concurrent requests across server instances never lose an
//! update.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use feedback_types::{Credential, UsageCounter};

use crate::modules::pg_helpers::{map_sqlx_err, row_to_credential, to_json};
use crate::modules::repository::{RateWindow, StoreResult};

pub(crate) async fn upsert_credential_impl(
    pool: &PgPool,
    key_hash: &str,
    credential: &Credential,
) -> StoreResult<Credential> {
    let row = sqlx::query(
        r#"INSERT INTO credentials (id, key_hash, tenant_id, project_id, plan, allowed_origins, revoked_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (key_hash) DO UPDATE SET
               tenant_id = EXCLUDED.tenant_id,
               project_id = EXCLUDED.project_id,
               plan = EXCLUDED.plan,
               allowed_origins = EXCLUDED.allowed_origins,
               revoked_at = EXCLUDED.revoked_at
           RETURNING id, tenant_id, project_id, plan, allowed_origins, revoked_at, last_used_at"#,
    )
    .bind(credential.id)
    .bind(key_hash)
    .bind(&credential.tenant_id)
    .bind(&credential.project_id)
    .bind(credential.plan.as_str())
    .bind(to_json(&credential.allowed_origins)?)
    .bind(credential.revoked_at)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_err)?;

    row_to_credential(&row)
}

pub(crate) async fn find_credential_impl(
    pool: &PgPool,
    key_hash: &str,
) -> StoreResult<Option<Credential>> {
    let row = sqlx::query(
        r#"SELECT id, tenant_id, project_id, plan, allowed_origins, revoked_at, last_used_at
           FROM credentials WHERE key_hash = $1"#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;

    row.as_ref().map(row_to_credential).transpose()
}

pub(crate) async fn touch_credential_impl(
    pool: &PgPool,
    id: Uuid,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    sqlx::query("UPDATE credentials SET last_used_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await
        .map_err(map_sqlx_err)?;
    Ok(())
}

pub(crate) async fn get_idempotency_impl(
    pool: &PgPool,
    key: &str,
    now: DateTime<Utc>,
) -> StoreResult<Option<serde_json::Value>> {
    let row = sqlx::query("SELECT body FROM idempotency_records WHERE key = $1 AND expires_at > $2")
        .bind(key)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_err)?;
    Ok(row.map(|r| r.get::<serde_json::Value, _>("body")))
}

pub(crate) async fn put_idempotency_impl(
    pool: &PgPool,
    key: &str,
    body: serde_json::Value,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> StoreResult<bool> {
    // Expired records may be replaced; live ones are write-once.
    let result = sqlx::query(
        r#"INSERT INTO idempotency_records (key, body, expires_at) VALUES ($1, $2, $3)
           ON CONFLICT (key) DO UPDATE SET body = EXCLUDED.body, expires_at = EXCLUDED.expires_at
           WHERE idempotency_records.expires_at <= $4"#,
    )
    .bind(key)
    .bind(body)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_sqlx_err)?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn purge_idempotency_impl(pool: &PgPool, now: DateTime<Utc>) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= $1")
        .bind(now)
        .execute(pool)
        .await
        .map_err(map_sqlx_err)?;
    Ok(result.rows_affected())
}

pub(crate) async fn hit_rate_window_impl(
    pool: &PgPool,
    credential_id: Uuid,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> StoreResult<RateWindow> {
    let row = sqlx::query(
        r#"INSERT INTO rate_limit_windows (credential_id, count, reset_at) VALUES ($1, 1, $3)
           ON CONFLICT (credential_id) DO UPDATE SET
               count = CASE WHEN rate_limit_windows.reset_at <= $2 THEN 1
                            ELSE rate_limit_windows.count + 1 END,
               reset_at = CASE WHEN rate_limit_windows.reset_at <= $2 THEN $3
                               ELSE rate_limit_windows.reset_at END
           RETURNING count, reset_at"#,
    )
    .bind(credential_id)
    .bind(now)
    .bind(now + window)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_err)?;

    let count: i64 = row.get("count");
    Ok(RateWindow { count: count.max(0) as u64, reset_at: row.get("reset_at") })
}

pub(crate) async fn get_usage_impl(pool: &PgPool, tenant_id: &str) -> StoreResult<Option<UsageCounter>> {
    let row = sqlx::query(
        "SELECT responses_this_month, reset_at FROM usage_counters WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;

    Ok(row.map(|r| {
        let count: i64 = r.get("responses_this_month");
        UsageCounter {
            tenant_id: tenant_id.to_string(),
            responses_this_month: count.max(0) as u64,
            reset_at: r.get("reset_at"),
        }
    }))
}

pub(crate) async fn increment_usage_impl(
    pool: &PgPool,
    tenant_id: &str,
    now: DateTime<Utc>,
    next_reset: DateTime<Utc>,
) -> StoreResult<UsageCounter> {
    let row = sqlx::query(
        r#"INSERT INTO usage_counters (tenant_id, responses_this_month, reset_at) VALUES ($1, 1, $3)
           ON CONFLICT (tenant_id) DO UPDATE SET
               responses_this_month = CASE WHEN usage_counters.reset_at <= $2 THEN 1
                                           ELSE usage_counters.responses_this_month + 1 END,
               reset_at = CASE WHEN usage_counters.reset_at <= $2 THEN $3
                               ELSE usage_counters.reset_at END
           RETURNING responses_this_month, reset_at"#,
    )
    .bind(tenant_id)
    .bind(now)
    .bind(next_reset)
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_err)?;

    let count: i64 = row.get("responses_this_month");
    Ok(UsageCounter {
        tenant_id: tenant_id.to_string(),
        responses_this_month: count.max(0) as u64,
        reset_at: row.get("reset_at"),
    })
}
