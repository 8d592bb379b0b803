//! Error types for the feedback client.

use feedback_types::RateLimitInfo;
use thiserror::Error;

/// Errors that can occur when using the feedback client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection failed or timed out before a response arrived.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// HTTP client could not be built or the request could not be constructed.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an invalid or unparseable response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Server returned 429 Too Many Requests.
    #[error("Rate limited (429): {message}")]
    RateLimited {
        /// Seconds to wait before retrying, if provided by server.
        retry_after: Option<u64>,
        message: String,
        /// Window state from the error envelope.
        rate_limit: Option<RateLimitInfo>,
    },

    /// Server returned a 5xx error.
    #[error("Server error ({status}): {message}")]
    ServerError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Server rejected the request with a non-retryable 4xx.
    #[error("Request rejected ({status}) {code}: {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
        details: Option<serde_json::Value>,
    },
}

impl ClientError {
    /// Transient failures the retry transport backs off on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RateLimited { .. } | Self::ServerError { .. })
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::ServerError { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Connection(_) | Self::Request(_) | Self::InvalidResponse(_) => None,
        }
    }

    /// Error code from the server envelope.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::RateLimited { .. } => Some("RATE_LIMITED"),
            Self::ServerError { code, .. } => code.as_deref(),
            Self::Rejected { code, .. } => Some(code),
            Self::Connection(_) | Self::Request(_) | Self::InvalidResponse(_) => None,
        }
    }
}
