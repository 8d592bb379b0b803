//! Ingestion API routes. Every route requires a valid credential.

mod auth;
mod error;
mod responses;


use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

pub use auth::credential_auth_middleware;
pub use error::ApiError;

use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/responses", post(responses::submit_response))
        .route("/responses/check", get(responses::check_existing))
        .route("/responses/:id", patch(responses::update_response))
        .route_layer(middleware::from_fn_with_state(state, credential_auth_middleware))
}
