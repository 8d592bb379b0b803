//! Submission coordinator.
//!
//! `received → validated → dedup-checked + rate-checked → resolved(create|update)
//! → persisted → usage-updated → responded`
//!
//! The idempotency lookup and the rate-limit hit are independent and run
//! concurrently. The response id and timestamp are fixed before the durable
//! write so every retry of one logical submission correlates to one row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use feedback_types::models::{PlanLimits, PlansConfig};
use feedback_types::{
    CheckExistingResponse, Credential, FeedbackResponse, IngestConfig, IngestError,
    RateLimitInfo, ResponsePatch, SubmissionStatus, SubmitRequest, SubmitResponse,
};
use uuid::Uuid;

use crate::ingest::idempotency::{IdempotencyCache, IdempotencyCheck};
use crate::ingest::notify::{crossed_thresholds, spawn_notifications, UsageAlert, UsageNotifier};
use crate::ingest::prometheus;
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::resolver::ExistingResponseResolver;
use crate::ingest::usage::UsageTracker;
use crate::ingest::validation::{
    normalize_idempotency_key, validate_edit, validate_patch, validate_submission,
};
use crate::modules::repository::{ConflictKind, IngestStore, StoreError};

/// Result of an accepted `POST /responses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub body: SubmitResponse,
    pub rate_limit: RateLimitInfo,
    /// Gated flag of the row written by this call; `false` for duplicates
    pub gated: bool,
}

/// Result of `GET /responses/check`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub body: CheckExistingResponse,
    pub rate_limit: RateLimitInfo,
}

/// Result of `PATCH /responses/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub response: FeedbackResponse,
    pub rate_limit: RateLimitInfo,
}

pub struct SubmissionCoordinator {
    store: Arc<dyn IngestStore>,
    idempotency: IdempotencyCache,
    rate_limiter: RateLimiter,
    usage: UsageTracker,
    resolver: ExistingResponseResolver,
    plans: PlansConfig,
    notifier: Arc<dyn UsageNotifier>,
    thresholds: Vec<u32>,
}

impl SubmissionCoordinator {
    pub fn new(
        store: Arc<dyn IngestStore>,
        config: &IngestConfig,
        notifier: Arc<dyn UsageNotifier>,
    ) -> Self {
        Self {
            idempotency: IdempotencyCache::new(Arc::clone(&store), config.idempotency.ttl_secs),
            rate_limiter: RateLimiter::new(Arc::clone(&store), config.plans.clone()),
            usage: UsageTracker::new(Arc::clone(&store)),
            resolver: ExistingResponseResolver::new(Arc::clone(&store)),
            plans: config.plans.clone(),
            thresholds: config.notifications.thresholds_percent.clone(),
            notifier,
            store,
        }
    }

    /// Accept one physical submission attempt.
    pub async fn submit(
        &self,
        credential: &Credential,
        request: SubmitRequest,
        idempotency_key: Option<&str>,
    ) -> Result<SubmitOutcome, IngestError> {
        validate_submission(&request)?;
        let key = normalize_idempotency_key(idempotency_key)?;

        let (dedup, rate) = tokio::join!(
            async {
                match key.as_deref() {
                    Some(k) => self.idempotency.check_idempotency(&credential.project_id, k).await,
                    None => IdempotencyCheck::Fresh,
                }
            },
            self.rate_limiter.check_rate_limit(credential.id, credential.plan),
        );

        if let IdempotencyCheck::Duplicate(body) = dedup {
            tracing::debug!(
                credential_id = %credential.id,
                response_id = %body.id,
                "Duplicate submission answered from idempotency cache"
            );
            prometheus::record_submission(SubmissionStatus::Duplicate.as_str());
            return Ok(SubmitOutcome { body, rate_limit: rate.info, gated: false });
        }
        let rate_limit = rate.into_result()?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        if let Some(existing) = self
            .resolver
            .check_existing(&credential.project_id, &request.element_id, request.end_user_id())
            .await?
        {
            return self.apply_edit(credential, existing, &request, key, rate_limit).await;
        }

        self.create(credential, request, key, id, now, rate_limit).await
    }

    /// `GET /responses/check`: whether the (element, user) pair has a response.
    pub async fn check_existing(
        &self,
        credential: &Credential,
        element_id: &str,
        user_id: Option<&str>,
    ) -> Result<CheckOutcome, IngestError> {
        if element_id.trim().is_empty() {
            return Err(IngestError::validation("elementId", "elementId is required"));
        }
        let rate_limit = self
            .rate_limiter
            .check_rate_limit(credential.id, credential.plan)
            .await
            .into_result()?;

        let existing = self.resolver.check_existing(&credential.project_id, element_id, user_id).await?;
        Ok(CheckOutcome { body: existing.into(), rate_limit })
    }

    /// `PATCH /responses/{id}`: overwrite mutable fields of a stored response.
    /// Responses owned by an end user can only be patched with a matching
    /// `user_id`.
    pub async fn update_response(
        &self,
        credential: &Credential,
        id: Uuid,
        user_id: Option<&str>,
        patch: ResponsePatch,
    ) -> Result<UpdateOutcome, IngestError> {
        let rate_limit = self
            .rate_limiter
            .check_rate_limit(credential.id, credential.plan)
            .await
            .into_result()?;

        let not_found = || IngestError::NotFound { id: id.to_string() };
        let existing = self
            .store
            .get_response(id)
            .await?
            .filter(|row| row.project_id == credential.project_id)
            .ok_or_else(not_found)?;

        if let Some(owner) = existing.end_user_id.as_deref() {
            if user_id.map(str::trim) != Some(owner) {
                return Err(not_found());
            }
        }

        validate_patch(&existing, &patch)?;

        let response = self
            .store
            .update_response(id, &patch, Utc::now())
            .await?
            .ok_or_else(not_found)?;
        prometheus::record_submission(SubmissionStatus::Updated.as_str());
        tracing::info!(
            tenant_id = %credential.tenant_id,
            response_id = %response.id,
            "Response patched"
        );
        Ok(UpdateOutcome { response, rate_limit })
    }

    async fn apply_edit(
        &self,
        credential: &Credential,
        existing: FeedbackResponse,
        request: &SubmitRequest,
        key: Option<String>,
        rate_limit: RateLimitInfo,
    ) -> Result<SubmitOutcome, IngestError> {
        // A retry of the submission that created this row.
        if key.is_some() && existing.idempotency_key == key {
            prometheus::record_submission(SubmissionStatus::Duplicate.as_str());
            return Ok(SubmitOutcome {
                body: SubmitResponse {
                    id: existing.id,
                    status: SubmissionStatus::Duplicate,
                    created_at: existing.created_at,
                },
                rate_limit,
                gated: false,
            });
        }

        let patch = validate_edit(&existing, request)?;
        let updated = self
            .store
            .update_response(existing.id, &patch, Utc::now())
            .await?
            .ok_or_else(|| IngestError::internal(format!("resolved response {} vanished", existing.id)))?;

        let body = SubmitResponse {
            id: updated.id,
            status: SubmissionStatus::Updated,
            created_at: updated.created_at,
        };
        if let Some(key) = key.as_deref() {
            self.idempotency.cache_response_detached(&credential.project_id, key, body.clone());
        }
        prometheus::record_submission(SubmissionStatus::Updated.as_str());
        tracing::info!(
            tenant_id = %credential.tenant_id,
            response_id = %updated.id,
            element_id = %updated.element_id,
            "Existing response updated"
        );
        Ok(SubmitOutcome { body, rate_limit, gated: updated.gated })
    }

    async fn create(
        &self,
        credential: &Credential,
        request: SubmitRequest,
        key: Option<String>,
        id: Uuid,
        now: DateTime<Utc>,
        rate_limit: RateLimitInfo,
    ) -> Result<SubmitOutcome, IngestError> {
        let limits = self.plans.for_tier(credential.plan);

        let current = match self.usage.current_count(&credential.tenant_id, now).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(tenant_id = %credential.tenant_id, error = %err, "Usage read failed");
                0
            },
        };
        if limits.is_hard_blocked(current) {
            return Err(IngestError::QuotaExceeded { tenant_id: credential.tenant_id.clone() });
        }

        let provisional = limits.should_gate(current.saturating_add(1));
        let row = FeedbackResponse::from_submission(
            id,
            &credential.project_id,
            &request,
            key.clone(),
            provisional,
            now,
        );

        match self.store.insert_response(&row).await {
            Ok(()) => {},
            Err(StoreError::Conflict(ConflictKind::IdempotencyKey)) => {
                return self.answer_key_conflict(credential, key.as_deref(), rate_limit).await;
            },
            Err(StoreError::Conflict(ConflictKind::ElementUser)) => {
                // Lost a create race for this user; the winner's row is edited.
                let existing = self
                    .resolver
                    .check_existing(&credential.project_id, &request.element_id, request.end_user_id())
                    .await?
                    .ok_or_else(|| IngestError::internal("conflicting response not found"))?;
                return self.apply_edit(credential, existing, &request, key, rate_limit).await;
            },
            Err(err) => {
                tracing::error!(
                    tenant_id = %credential.tenant_id,
                    response_id = %id,
                    error = %err,
                    "Failed to persist response"
                );
                return Err(err.into());
            },
        }

        let gated = self.record_usage(credential, limits, id, provisional).await;

        let body = SubmitResponse { id, status: SubmissionStatus::Created, created_at: now };
        if let Some(key) = key.as_deref() {
            self.idempotency.cache_response_detached(&credential.project_id, key, body.clone());
        }
        prometheus::record_submission(SubmissionStatus::Created.as_str());
        tracing::info!(
            tenant_id = %credential.tenant_id,
            response_id = %id,
            element_id = %request.element_id,
            mode = %request.mode,
            gated,
            "Response created"
        );
        Ok(SubmitOutcome { body, rate_limit, gated })
    }

    /// Another attempt with this key already inserted; answer with its row.
    async fn answer_key_conflict(
        &self,
        credential: &Credential,
        key: Option<&str>,
        rate_limit: RateLimitInfo,
    ) -> Result<SubmitOutcome, IngestError> {
        let Some(key) = key else {
            return Err(IngestError::internal("idempotency conflict without a key"));
        };
        let stored = self
            .store
            .find_by_idempotency_key(&credential.project_id, key)
            .await?
            .ok_or_else(|| IngestError::internal("conflicting idempotency key not found"))?;

        prometheus::record_submission(SubmissionStatus::Duplicate.as_str());
        tracing::debug!(response_id = %stored.id, "Duplicate submission caught by unique key");
        Ok(SubmitOutcome {
            body: SubmitResponse {
                id: stored.id,
                status: SubmissionStatus::Duplicate,
                created_at: stored.created_at,
            },
            rate_limit,
            gated: false,
        })
    }

    /// Increment usage after a successful create and settle the gated flag.
    /// A failed increment keeps the provisional flag and never fails the
    /// submission.
    async fn record_usage(
        &self,
        credential: &Credential,
        limits: &PlanLimits,
        id: Uuid,
        provisional: bool,
    ) -> bool {
        let counter = match self.usage.atomic_increment_usage(&credential.tenant_id).await {
            Ok(counter) => counter,
            Err(err) => {
                tracing::warn!(
                    tenant_id = %credential.tenant_id,
                    response_id = %id,
                    error = %err,
                    "Usage increment failed"
                );
                return provisional;
            },
        };

        let count = counter.responses_this_month;
        let gated = limits.should_gate(count);
        if gated != provisional {
            if let Err(err) = self.store.set_gated(id, gated).await {
                tracing::warn!(response_id = %id, error = %err, "Failed to correct gated flag");
            }
        }
        if gated {
            prometheus::record_gated();
        }

        if let Some(limit) = limits.monthly_responses {
            let alerts: Vec<UsageAlert> = crossed_thresholds(count, limit, &self.thresholds)
                .into_iter()
                .map(|threshold_percent| UsageAlert {
                    tenant_id: credential.tenant_id.clone(),
                    plan: credential.plan,
                    threshold_percent,
                    count,
                    limit,
                })
                .collect();
            spawn_notifications(Arc::clone(&self.notifier), alerts);
        }

        gated
    }
}
