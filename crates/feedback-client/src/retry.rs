//! Retry transport with bounded exponential backoff.

use std::time::Duration;

use feedback_types::{ErrorEnvelope, RateLimitInfo};
use reqwest::{Client, Request, Response, StatusCode};

use crate::error::ClientError;
use crate::types::RetryConfig;

/// `min(max_delay, base_delay * 2^attempt)`, where `attempt` is zero-based.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(config.base_delay_ms.saturating_mul(factor).min(config.max_delay_ms))
}

/// Sends requests, retrying connection failures, 5xx and 429.
///
/// Attempts for one call run strictly one after another. The request is
/// cloned per attempt, so headers such as the idempotency key are identical
/// on every attempt.
#[derive(Clone)]
pub struct RetryTransport {
    client: Client,
    config: RetryConfig,
}

impl RetryTransport {
    pub fn new(client: Client, config: RetryConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send `request` until it succeeds, fails non-retryably, or retries are
    /// exhausted. The last error is returned unchanged.
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let mut attempt: u32 = 0;

        loop {
            let attempt_request = request.try_clone().ok_or_else(|| {
                ClientError::InvalidResponse("request body cannot be replayed".to_string())
            })?;

            let result = match self.client.execute(attempt_request).await {
                Ok(response) => check_status(response).await,
                Err(e) => Err(ClientError::Connection(e.to_string())),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.delay_for(&err, attempt);
                    tracing::debug!(
                        "{} {} failed ({}), retrying in {}ms (attempt {}/{})",
                        request.method(),
                        request.url().path(),
                        err,
                        delay.as_millis(),
                        attempt + 1,
                        self.config.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Backoff for this attempt, stretched to `Retry-After` but never past
    /// `max_delay_ms`.
    fn delay_for(&self, err: &ClientError, attempt: u32) -> Duration {
        let backoff = backoff_delay(&self.config, attempt);
        match err {
            ClientError::RateLimited { retry_after: Some(secs), .. } => backoff
                .max(Duration::from_secs(*secs))
                .min(Duration::from_millis(self.config.max_delay_ms)),
            _ => backoff,
        }
    }
}

/// Map a non-success status to its error, parsing the server envelope.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after: Option<u64> = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());

    let text = response.text().await.unwrap_or_default();
    let envelope = serde_json::from_str::<ErrorEnvelope>(&text).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let rate_limit = envelope
            .as_ref()
            .and_then(|e| e.error.details.clone())
            .and_then(|details| serde_json::from_value::<RateLimitInfo>(details).ok());
        return Err(ClientError::RateLimited {
            retry_after: retry_after.or(rate_limit.map(|info| info.retry_after_secs)),
            message: envelope.map_or(text, |e| e.error.message),
            rate_limit,
        });
    }

    if status.is_server_error() {
        return Err(ClientError::ServerError {
            status: status.as_u16(),
            code: envelope.as_ref().map(|e| e.error.code.clone()),
            message: envelope.map_or(text, |e| e.error.message),
        });
    }

    Err(match envelope {
        Some(envelope) => ClientError::Rejected {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
            details: envelope.error.details,
        },
        None => ClientError::Rejected {
            status: status.as_u16(),
            code: format!("HTTP_{}", status.as_u16()),
            message: text,
            details: None,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(base_delay_ms: u64, max_delay_ms: u64) -> RetryTransport {
        RetryTransport::new(
            Client::new(),
            RetryConfig { max_retries: 2, base_delay_ms, max_delay_ms },
        )
    }

    fn post(server: &MockServer) -> Request {
        Client::new()
            .post(format!("{}/responses", server.uri()))
            .header("idempotency-key", "logical-1")
            .json(&serde_json::json!({"elementId": "nps", "mode": "feedback", "rating": 5}))
            .build()
            .unwrap()
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&config, 4), Duration::from_millis(5000));
        assert_eq!(backoff_delay(&config, 80), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_two_503_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "status": "created",
                "createdAt": "2026-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let started = Instant::now();
        let response = transport(50, 1_000).send(post(&server)).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "created");
        assert!(elapsed >= Duration::from_millis(150), "elapsed {:?}", elapsed);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request.headers.get("idempotency-key").unwrap().to_str().unwrap(), "logical-1");
        }
    }

    #[tokio::test]
    async fn test_400_returns_after_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "VALIDATION_ERROR", "message": "vote requires a vote value",
                          "details": {"field": "vote"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let started = Instant::now();
        let err = transport(1_000, 5_000).send(post(&server)).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(1_000));
        match err {
            ClientError::Rejected { status, code, details, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "VALIDATION_ERROR");
                assert_eq!(details.unwrap()["field"], "vote");
            },
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": "INTERNAL_ERROR", "message": "Internal server error"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = transport(10, 100).send(post(&server)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.code(), Some("INTERNAL_ERROR"));
        assert_eq!(err.to_string(), "Server error (500): Internal server error");
    }

    #[tokio::test]
    async fn test_retry_after_is_honoured_within_cap() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let started = Instant::now();
        transport(10, 5_000).send(post(&server)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retry_after_never_exceeds_max_delay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let started = Instant::now();
        let err = transport(10, 100).send(post(&server)).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, ClientError::RateLimited { retry_after: Some(30), .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_keeps_server_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", "4").set_body_json(serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded, retry after 4s",
                        "details": {"limit": 5, "remaining": 0, "resetAt": 1_700_000_004_i64, "retryAfterSecs": 4}
                    }
                })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = transport(10, 50).send(post(&server)).await.unwrap_err();

        assert_eq!(err.to_string(), "Rate limited (429): Rate limit exceeded, retry after 4s");
        assert_eq!(err.code(), Some("RATE_LIMITED"));
        match err {
            ClientError::RateLimited { retry_after, rate_limit, .. } => {
                assert_eq!(retry_after, Some(4));
                let info = rate_limit.unwrap();
                assert_eq!((info.limit, info.remaining, info.reset_at), (5, 0, 1_700_000_004));
            },
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried_then_surfaced() {
        let server = MockServer::start().await;
        let request = post(&server);
        drop(server);

        let err = transport(10, 50).send(request).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }
}
