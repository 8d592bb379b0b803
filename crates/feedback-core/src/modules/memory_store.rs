//! In-process ingest store.
//!
//! Each mutation runs inside a single `DashMap` entry guard, so increments and
//! unique-index checks are atomic per key. Only suitable for a single server
//! instance; multi-instance deployments use the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use feedback_types::{Credential, FeedbackResponse, ResponsePatch, UsageCounter};

use crate::modules::repository::{
    ConflictKind, IngestStore, RateWindow, StoreError, StoreResult,
};

struct IdempotencyRecord {
    body: serde_json::Value,
    expires_at: DateTime<Utc>,
}

type ElementUserKey = (String, String, String);

#[derive(Default)]
pub struct MemoryStore {
    credentials: DashMap<String, Credential>,
    idempotency: DashMap<String, IdempotencyRecord>,
    rate_windows: DashMap<Uuid, RateWindow>,
    usage: DashMap<String, UsageCounter>,
    responses: DashMap<Uuid, FeedbackResponse>,
    by_idempotency_key: DashMap<(String, String), Uuid>,
    by_element_user: DashMap<ElementUserKey, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired idempotency records.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.idempotency.len();
        self.idempotency.retain(|_, record| record.expires_at > now);
        before.saturating_sub(self.idempotency.len())
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn upsert_credential(
        &self,
        key_hash: &str,
        credential: &Credential,
    ) -> StoreResult<Credential> {
        let stored = match self.credentials.entry(key_hash.to_string()) {
            Entry::Occupied(mut existing) => {
                let id = existing.get().id;
                let last_used_at = existing.get().last_used_at;
                existing.insert(Credential { id, last_used_at, ..credential.clone() });
                existing.get().clone()
            },
            Entry::Vacant(slot) => slot.insert(credential.clone()).clone(),
        };
        Ok(stored)
    }

    async fn find_credential(&self, key_hash: &str) -> StoreResult<Option<Credential>> {
        Ok(self.credentials.get(key_hash).map(|c| c.clone()))
    }

    async fn touch_credential(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        for mut credential in self.credentials.iter_mut() {
            if credential.id == id {
                credential.last_used_at = Some(at);
            }
        }
        Ok(())
    }

    async fn get_idempotency(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<serde_json::Value>> {
        Ok(self
            .idempotency
            .get(key)
            .filter(|record| record.expires_at > now)
            .map(|record| record.body.clone()))
    }

    async fn put_idempotency(
        &self,
        key: &str,
        body: serde_json::Value,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.idempotency.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                if existing.get().expires_at > now {
                    return Ok(false);
                }
                existing.insert(IdempotencyRecord { body, expires_at });
            },
            Entry::Vacant(slot) => {
                slot.insert(IdempotencyRecord { body, expires_at });
            },
        }
        Ok(true)
    }

    async fn purge_idempotency(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.purge_expired(now) as u64)
    }

    async fn hit_rate_window(
        &self,
        credential_id: Uuid,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<RateWindow> {
        let mut entry = self
            .rate_windows
            .entry(credential_id)
            .or_insert(RateWindow { count: 0, reset_at: now + window });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }
        entry.count = entry.count.saturating_add(1);
        Ok(*entry)
    }

    async fn get_usage(&self, tenant_id: &str) -> StoreResult<Option<UsageCounter>> {
        Ok(self.usage.get(tenant_id).map(|u| u.clone()))
    }

    async fn increment_usage(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        next_reset: DateTime<Utc>,
    ) -> StoreResult<UsageCounter> {
        let mut entry = self.usage.entry(tenant_id.to_string()).or_insert(UsageCounter {
            tenant_id: tenant_id.to_string(),
            responses_this_month: 0,
            reset_at: next_reset,
        });
        if now >= entry.reset_at {
            entry.responses_this_month = 0;
            entry.reset_at = next_reset;
        }
        entry.responses_this_month = entry.responses_this_month.saturating_add(1);
        Ok(entry.clone())
    }

    async fn insert_response(&self, response: &FeedbackResponse) -> StoreResult<()> {
        // Lock order: idempotency index, then element/user index.
        let idem_slot = match &response.idempotency_key {
            Some(key) => {
                match self.by_idempotency_key.entry((response.project_id.clone(), key.clone())) {
                    Entry::Occupied(_) => {
                        return Err(StoreError::Conflict(ConflictKind::IdempotencyKey))
                    },
                    Entry::Vacant(slot) => Some(slot),
                }
            },
            None => None,
        };
        let user_slot = match &response.end_user_id {
            Some(user) => match self.by_element_user.entry((
                response.project_id.clone(),
                response.element_id.clone(),
                user.clone(),
            )) {
                Entry::Occupied(_) => return Err(StoreError::Conflict(ConflictKind::ElementUser)),
                Entry::Vacant(slot) => Some(slot),
            },
            None => None,
        };

        self.responses.insert(response.id, response.clone());
        if let Some(slot) = idem_slot {
            slot.insert(response.id);
        }
        if let Some(slot) = user_slot {
            slot.insert(response.id);
        }
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> StoreResult<Option<FeedbackResponse>> {
        Ok(self.responses.get(&id).map(|r| r.clone()))
    }

    async fn find_by_element_user(
        &self,
        project_id: &str,
        element_id: &str,
        end_user_id: &str,
    ) -> StoreResult<Option<FeedbackResponse>> {
        let key = (project_id.to_string(), element_id.to_string(), end_user_id.to_string());
        let Some(id) = self.by_element_user.get(&key).map(|id| *id) else {
            return Ok(None);
        };
        self.get_response(id).await
    }

    async fn find_by_idempotency_key(
        &self,
        project_id: &str,
        idempotency_key: &str,
    ) -> StoreResult<Option<FeedbackResponse>> {
        let key = (project_id.to_string(), idempotency_key.to_string());
        let Some(id) = self.by_idempotency_key.get(&key).map(|id| *id) else {
            return Ok(None);
        };
        self.get_response(id).await
    }

    async fn update_response(
        &self,
        id: Uuid,
        patch: &ResponsePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FeedbackResponse>> {
        Ok(self.responses.get_mut(&id).map(|mut row| {
            row.apply_patch(patch, now);
            row.clone()
        }))
    }

    async fn set_gated(&self, id: Uuid, gated: bool) -> StoreResult<()> {
        if let Some(mut row) = self.responses.get_mut(&id) {
            row.gated = gated;
        }
        Ok(())
    }

    async fn count_responses(&self, project_id: &str) -> StoreResult<u64> {
        Ok(self.responses.iter().filter(|r| r.project_id == project_id).count() as u64)
    }
}
