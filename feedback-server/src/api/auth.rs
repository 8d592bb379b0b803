use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};

use feedback_core::ingest::auth::extract_api_key;

use super::ApiError;
use crate::state::AppState;

/// Resolve the request's API key to a `Credential` and store it as a request
/// extension for the handlers.
pub async fn credential_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let x_api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());

    let credential = state
        .inner
        .authenticator
        .authenticate(extract_api_key(authorization, x_api_key), origin)
        .await?;

    tracing::trace!(
        credential_id = %credential.id,
        tenant_id = %credential.tenant_id,
        "{} {}",
        request.method(),
        request.uri().path()
    );
    request.extensions_mut().insert(credential);
    Ok(next.run(request).await)
}
