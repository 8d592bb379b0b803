//! Typed error definitions for feedback ingestion.
//!
//! `IngestError` is the single error surface of the collection endpoint. Every
//! variant knows its HTTP status, its stable wire code, and whether a client
//! transport may retry it.

mod config;

pub use config::ConfigError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RateLimitInfo;

/// Errors surfaced by the ingestion endpoint.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum IngestError {
    /// Request body failed schema or mode validation
    #[error("Invalid request: {message}")]
    Validation {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Missing, unknown, or revoked credential
    #[error("Invalid credential")]
    InvalidCredential,

    /// Request origin is not in the credential's allow-list
    #[error("Origin not allowed: {origin}")]
    OriginNotAllowed { origin: String },

    /// Tenant is past its hard monthly limit
    #[error("Monthly quota exceeded for tenant {tenant_id}")]
    QuotaExceeded { tenant_id: String },

    /// Referenced response does not exist for this credential/user
    #[error("Response not found: {id}")]
    NotFound { id: String },

    /// Per-credential request budget exhausted
    #[error("Rate limit exceeded, retry after {}s", .info.retry_after_secs)]
    RateLimited { info: RateLimitInfo },

    /// Unexpected server-side failure (details are logged, not exposed)
    #[error("Internal server error")]
    Internal { message: String },
}

impl IngestError {
    /// Shorthand for a validation error on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Shorthand for an internal error; `message` is for logs only.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::InvalidCredential => 401,
            Self::OriginNotAllowed { .. } | Self::QuotaExceeded { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::RateLimited { .. } => 429,
            Self::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::OriginNotAllowed { .. } => "ORIGIN_NOT_ALLOWED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Transient errors a client transport should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Internal { .. })
    }

    /// Build the wire envelope. Internal details never leave the server.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let (message, details) = match self {
            Self::Internal { .. } => ("Internal server error".to_string(), None),
            Self::Validation { message, field } => (
                message.clone(),
                field.as_ref().map(|f| serde_json::json!({ "field": f })),
            ),
            Self::RateLimited { info } => (
                self.to_string(),
                serde_json::to_value(info).ok(),
            ),
            other => (other.to_string(), None),
        };
        ErrorEnvelope { error: ErrorBody { code: self.code().to_string(), message, details } }
    }
}

/// `{error: {code, message, details?}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Body of the error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standard Result type using IngestError.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(IngestError::validation("vote", "missing").http_status_code(), 400);
        assert_eq!(IngestError::InvalidCredential.http_status_code(), 401);
        assert_eq!(
            IngestError::OriginNotAllowed { origin: "https://evil.test".into() }
                .http_status_code(),
            403
        );
        assert_eq!(IngestError::internal("boom").http_status_code(), 500);
    }

    #[test]
    fn test_retryability() {
        let limited = IngestError::RateLimited {
            info: RateLimitInfo { limit: 5, remaining: 0, reset_at: 0, retry_after_secs: 3 },
        };
        assert!(limited.is_retryable());
        assert!(IngestError::internal("db down").is_retryable());
        assert!(!IngestError::validation("elementId", "empty").is_retryable());
        assert!(!IngestError::InvalidCredential.is_retryable());
    }

    #[test]
    fn test_internal_envelope_hides_detail() {
        let envelope = IngestError::internal("connection refused to 10.0.0.3").to_envelope();
        assert_eq!(envelope.error.code, "INTERNAL_ERROR");
        assert!(!envelope.error.message.contains("10.0.0.3"));

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_validation_envelope_carries_field() {
        let envelope = IngestError::validation("pollSelected", "at least one selection").to_envelope();
        assert_eq!(envelope.error.code, "VALIDATION_ERROR");
        assert_eq!(envelope.error.details.unwrap()["field"], "pollSelected");
    }
}
