use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use feedback_types::{Credential, IngestError, ResponsePatch, SubmitRequest};

use super::error::insert_rate_limit_headers;
use super::ApiError;
use crate::state::AppState;

const IDEMPOTENCY_HEADERS: [&str; 2] = ["idempotency-key", "x-idempotency-key"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    pub element_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

pub async fn submit_response(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    headers: HeaderMap,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(json_rejection)?;
    let key = idempotency_key(&headers)?;

    let outcome = state.coordinator().submit(&credential, request, key).await?;

    let mut response = (StatusCode::CREATED, Json(outcome.body)).into_response();
    insert_rate_limit_headers(&mut response, &outcome.rate_limit, false);
    Ok(response)
}

pub async fn check_existing(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query
        .map_err(|e| IngestError::Validation { message: e.body_text(), field: None })?;
    let element_id = query.element_id.unwrap_or_default();

    let outcome = state
        .coordinator()
        .check_existing(&credential, &element_id, query.user_id.as_deref())
        .await?;

    let mut response = Json(outcome.body).into_response();
    insert_rate_limit_headers(&mut response, &outcome.rate_limit, false);
    Ok(response)
}

pub async fn update_response(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<ResponsePatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|e| IngestError::validation("id", e.body_text()))?;
    let Query(query) = query
        .map_err(|e| IngestError::Validation { message: e.body_text(), field: None })?;
    let Json(patch) = payload.map_err(json_rejection)?;

    let outcome = state
        .coordinator()
        .update_response(&credential, id, query.user_id.as_deref(), patch)
        .await?;

    let mut response = Json(outcome.response).into_response();
    insert_rate_limit_headers(&mut response, &outcome.rate_limit, false);
    Ok(response)
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<&str>, IngestError> {
    let Some(value) = IDEMPOTENCY_HEADERS.iter().find_map(|name| headers.get(*name)) else {
        return Ok(None);
    };
    value
        .to_str()
        .map(Some)
        .map_err(|_| IngestError::validation("idempotencyKey", "idempotency key must be visible ASCII"))
}

fn json_rejection(rejection: JsonRejection) -> IngestError {
    IngestError::Validation { message: rejection.body_text(), field: None }
}
