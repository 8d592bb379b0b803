//! Response rows for PostgreSQL.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use feedback_types::{FeedbackResponse, ResponsePatch};

use crate::modules::pg_helpers::{map_sqlx_err, row_to_response, to_json};
use crate::modules::repository::StoreResult;

const RESPONSE_COLUMNS: &str = "id, project_id, element_id, mode, content, rating, vote, \
     poll_options, poll_selected, experiment_id, variant, end_user_id, end_user_attributes, \
     context, idempotency_key, gated, created_at, updated_at";

pub(crate) async fn insert_response_impl(pool: &PgPool, response: &FeedbackResponse) -> StoreResult<()> {
    let poll_options = response.poll_options.as_ref().map(to_json).transpose()?;
    let poll_selected = response.poll_selected.as_ref().map(to_json).transpose()?;
    let context = response.context.as_ref().map(to_json).transpose()?;

    sqlx::query(
        r#"INSERT INTO responses (id, project_id, element_id, mode, content, rating, vote,
               poll_options, poll_selected, experiment_id, variant, end_user_id,
               end_user_attributes, context, idempotency_key, gated, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"#,
    )
    .bind(response.id)
    .bind(&response.project_id)
    .bind(&response.element_id)
    .bind(response.mode.as_str())
    .bind(&response.content)
    .bind(response.rating.map(i16::from))
    .bind(response.vote.map(|v| v.as_str()))
    .bind(poll_options)
    .bind(poll_selected)
    .bind(&response.experiment_id)
    .bind(&response.variant)
    .bind(&response.end_user_id)
    .bind(to_json(&response.end_user_attributes)?)
    .bind(context)
    .bind(&response.idempotency_key)
    .bind(response.gated)
    .bind(response.created_at)
    .bind(response.updated_at)
    .execute(pool)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

pub(crate) async fn get_response_impl(pool: &PgPool, id: Uuid) -> StoreResult<Option<FeedbackResponse>> {
    let row = sqlx::query(&format!("SELECT {} FROM responses WHERE id = $1", RESPONSE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_err)?;
    row.as_ref().map(row_to_response).transpose()
}

pub(crate) async fn find_by_element_user_impl(
    pool: &PgPool,
    project_id: &str,
    element_id: &str,
    end_user_id: &str,
) -> StoreResult<Option<FeedbackResponse>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM responses WHERE project_id = $1 AND element_id = $2 AND end_user_id = $3",
        RESPONSE_COLUMNS
    ))
    .bind(project_id)
    .bind(element_id)
    .bind(end_user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;
    row.as_ref().map(row_to_response).transpose()
}

pub(crate) async fn find_by_idempotency_key_impl(
    pool: &PgPool,
    project_id: &str,
    idempotency_key: &str,
) -> StoreResult<Option<FeedbackResponse>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM responses WHERE project_id = $1 AND idempotency_key = $2",
        RESPONSE_COLUMNS
    ))
    .bind(project_id)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;
    row.as_ref().map(row_to_response).transpose()
}

pub(crate) async fn update_response_impl(
    pool: &PgPool,
    id: Uuid,
    patch: &ResponsePatch,
    now: DateTime<Utc>,
) -> StoreResult<Option<FeedbackResponse>> {
    let poll_selected = patch.poll_selected.as_ref().map(to_json).transpose()?;
    let attributes = patch.end_user_attributes.as_ref().map(to_json).transpose()?;

    // Single statement: concurrent edits resolve last-write-wins per column.
    let row = sqlx::query(&format!(
        r#"UPDATE responses SET
               content = COALESCE($2, content),
               rating = COALESCE($3, rating),
               vote = COALESCE($4, vote),
               poll_selected = COALESCE($5, poll_selected),
               variant = COALESCE($6, variant),
               end_user_attributes = COALESCE($7, end_user_attributes),
               updated_at = $8
           WHERE id = $1
           RETURNING {}"#,
        RESPONSE_COLUMNS
    ))
    .bind(id)
    .bind(&patch.content)
    .bind(patch.rating.map(i16::from))
    .bind(patch.vote.map(|v| v.as_str()))
    .bind(poll_selected)
    .bind(&patch.variant)
    .bind(attributes)
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_err)?;
    row.as_ref().map(row_to_response).transpose()
}

pub(crate) async fn set_gated_impl(pool: &PgPool, id: Uuid, gated: bool) -> StoreResult<()> {
    sqlx::query("UPDATE responses SET gated = $2 WHERE id = $1")
        .bind(id)
        .bind(gated)
        .execute(pool)
        .await
        .map_err(map_sqlx_err)?;
    Ok(())
}

pub(crate) async fn count_responses_impl(pool: &PgPool, project_id: &str) -> StoreResult<u64> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM responses WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_err)?;
    let total: i64 = row.get("total");
    Ok(total.max(0) as u64)
}
