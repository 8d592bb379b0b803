use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};

use feedback_core::ingest::rate_limit::rate_limit_headers;
use feedback_types::{IngestError, RateLimitInfo};

/// `IngestError` rendered as the `{error: {code, message, details?}}` envelope.
#[derive(Debug)]
pub struct ApiError(pub IngestError);

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.0 {
            IngestError::Internal { message } => tracing::error!("Internal error: {}", message),
            other if status.is_client_error() => tracing::debug!("Request rejected: {}", other),
            _ => {},
        }

        let mut response = (status, Json(self.0.to_envelope())).into_response();
        if let IngestError::RateLimited { info } = &self.0 {
            insert_rate_limit_headers(&mut response, info, true);
        }
        response
    }
}

/// Attach `X-RateLimit-*` (and `Retry-After` when limited) to a response.
pub fn insert_rate_limit_headers(response: &mut Response, info: &RateLimitInfo, limited: bool) {
    let headers = response.headers_mut();
    for (name, value) in rate_limit_headers(info, limited) {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
