//! Helper functions for PostgreSQL ingest operations.

use feedback_types::{ClientContext, Credential, FeedbackResponse, PlanTier, ResponseMode, Vote};
use sqlx::Row;
use uuid::Uuid;

use crate::modules::repository::{ConflictKind, StoreError};

const IDEMPOTENCY_KEY_INDEX: &str = "responses_project_idempotency_key_uniq";
const ELEMENT_USER_INDEX: &str = "responses_project_element_user_uniq";

/// Map a sqlx error to a StoreError, recognising our unique indexes.
pub(crate) fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some(IDEMPOTENCY_KEY_INDEX) => return StoreError::Conflict(ConflictKind::IdempotencyKey),
            Some(ELEMENT_USER_INDEX) => return StoreError::Conflict(ConflictKind::ElementUser),
            _ => {},
        }
    }
    StoreError::Database(err.to_string())
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Convert a PostgreSQL row to a Credential.
pub(crate) fn row_to_credential(row: &sqlx::postgres::PgRow) -> Result<Credential, StoreError> {
    let plan: String = row.get("plan");
    let origins: serde_json::Value = row.get("allowed_origins");
    Ok(Credential {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        project_id: row.get("project_id"),
        plan: plan.parse::<PlanTier>().map_err(StoreError::Serialization)?,
        revoked_at: row.get("revoked_at"),
        last_used_at: row.get("last_used_at"),
        allowed_origins: from_json(origins)?,
    })
}

/// Convert a PostgreSQL row to a FeedbackResponse.
pub(crate) fn row_to_response(row: &sqlx::postgres::PgRow) -> Result<FeedbackResponse, StoreError> {
    let id: Uuid = row.get("id");
    let mode: String = row.get("mode");
    let vote: Option<String> = row.get("vote");
    let rating: Option<i16> = row.get("rating");
    let poll_options: Option<serde_json::Value> = row.get("poll_options");
    let poll_selected: Option<serde_json::Value> = row.get("poll_selected");
    let attributes: serde_json::Value = row.get("end_user_attributes");
    let context: Option<serde_json::Value> = row.get("context");

    Ok(FeedbackResponse {
        id,
        project_id: row.get("project_id"),
        element_id: row.get("element_id"),
        mode: mode.parse::<ResponseMode>().map_err(StoreError::Serialization)?,
        content: row.get("content"),
        rating: rating.and_then(|r| u8::try_from(r).ok()),
        vote: vote.map(|v| v.parse::<Vote>()).transpose().map_err(StoreError::Serialization)?,
        poll_options: poll_options.map(from_json).transpose()?,
        poll_selected: poll_selected.map(from_json).transpose()?,
        experiment_id: row.get("experiment_id"),
        variant: row.get("variant"),
        end_user_id: row.get("end_user_id"),
        end_user_attributes: from_json(attributes)?,
        context: context.map(from_json::<ClientContext>).transpose()?,
        idempotency_key: row.get("idempotency_key"),
        gated: row.get("gated"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
