//! Usage threshold notifications.
//!
//! Fired from a detached task when an increment lands exactly on a configured
//! percentage of the monthly quota. Delivery failures are logged only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feedback_types::models::NotificationConfig;
use feedback_types::PlanTier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::prometheus;

/// Payload delivered to a [`UsageNotifier`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageAlert {
    pub tenant_id: String,
    pub plan: PlanTier,
    pub threshold_percent: u32,
    pub count: u64,
    pub limit: u64,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook rejected notification with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait UsageNotifier: Send + Sync {
    async fn notify(&self, alert: &UsageAlert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log.
pub struct LogNotifier;

#[async_trait]
impl UsageNotifier for LogNotifier {
    async fn notify(&self, alert: &UsageAlert) -> Result<(), NotifyError> {
        tracing::info!(
            tenant_id = %alert.tenant_id,
            plan = %alert.plan,
            threshold = alert.threshold_percent,
            count = alert.count,
            limit = alert.limit,
            "Usage threshold reached"
        );
        Ok(())
    }
}

/// POSTs alerts as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl UsageNotifier for WebhookNotifier {
    async fn notify(&self, alert: &UsageAlert) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(alert).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected { status: response.status().as_u16() });
        }
        Ok(())
    }
}

/// Webhook notifier when configured, log notifier otherwise.
pub fn notifier_from_config(config: &NotificationConfig) -> Arc<dyn UsageNotifier> {
    match config.webhook_url.as_deref() {
        Some(url) => match WebhookNotifier::new(url) {
            Ok(notifier) => Arc::new(notifier),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to build webhook notifier; using log notifier");
                Arc::new(LogNotifier)
            },
        },
        None => Arc::new(LogNotifier),
    }
}

/// Count at which `percent` of `limit` is reached: `ceil(limit * percent / 100)`.
pub fn threshold_count(limit: u64, percent: u32) -> u64 {
    limit.saturating_mul(u64::from(percent)).div_ceil(100)
}

/// Thresholds that `count` lands on exactly.
pub fn crossed_thresholds(count: u64, limit: u64, thresholds: &[u32]) -> Vec<u32> {
    thresholds
        .iter()
        .copied()
        .filter(|&pct| pct > 0 && threshold_count(limit, pct) == count)
        .collect()
}

/// Deliver alerts from a detached task. Never awaited by the caller.
pub fn spawn_notifications(notifier: Arc<dyn UsageNotifier>, alerts: Vec<UsageAlert>) {
    if alerts.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for alert in alerts {
            match notifier.notify(&alert).await {
                Ok(()) => prometheus::record_notification("sent"),
                Err(err) => {
                    prometheus::record_notification("failed");
                    tracing::warn!(
                        tenant_id = %alert.tenant_id,
                        threshold = alert.threshold_percent,
                        error = %err,
                        "Usage notification failed"
                    );
                },
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> UsageAlert {
        UsageAlert {
            tenant_id: "acme".into(),
            plan: PlanTier::Free,
            threshold_percent: 80,
            count: 800,
            limit: 1000,
        }
    }

    #[test]
    fn test_threshold_count_rounds_up() {
        assert_eq!(threshold_count(1000, 80), 800);
        assert_eq!(threshold_count(3, 80), 3);
        assert_eq!(threshold_count(7, 50), 4);
        assert_eq!(threshold_count(1000, 100), 1000);
    }

    #[test]
    fn test_crossed_thresholds_fire_once() {
        let thresholds = [80, 100];
        assert_eq!(crossed_thresholds(799, 1000, &thresholds), Vec::<u32>::new());
        assert_eq!(crossed_thresholds(800, 1000, &thresholds), vec![80]);
        assert_eq!(crossed_thresholds(801, 1000, &thresholds), Vec::<u32>::new());
        assert_eq!(crossed_thresholds(1000, 1000, &thresholds), vec![100]);
        // both land on the same count for tiny quotas
        assert_eq!(crossed_thresholds(1, 1, &thresholds), vec![80, 100]);
    }

    #[tokio::test]
    async fn test_webhook_posts_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/usage"))
            .and(body_partial_json(serde_json::json!({"tenantId": "acme", "thresholdPercent": 80})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hooks/usage", server.uri())).unwrap();
        notifier.notify(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri()).unwrap();
        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 500 }));
    }
}
