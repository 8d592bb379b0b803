//! Application State
//!
//! Shared, immutable handles to the ingestion pipeline. All cross-request
//! mutable state lives in the store.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use feedback_core::ingest::notify::notifier_from_config;
use feedback_core::ingest::Authenticator;
use feedback_core::{IngestStore, SubmissionCoordinator};
use feedback_types::IngestConfig;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub coordinator: SubmissionCoordinator,
    pub authenticator: Authenticator,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn IngestStore>,
        config: &IngestConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let notifier = notifier_from_config(&config.notifications);
        Self {
            inner: Arc::new(AppStateInner {
                coordinator: SubmissionCoordinator::new(Arc::clone(&store), config, notifier),
                authenticator: Authenticator::new(store),
                metrics,
            }),
        }
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        &self.inner.coordinator
    }
}
