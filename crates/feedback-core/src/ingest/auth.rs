//! API key authentication and origin allow-listing.

use std::sync::Arc;

use chrono::Utc;
use feedback_types::{Credential, IngestError};

use crate::modules::credentials::hash_key;
use crate::modules::repository::IngestStore;

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn IngestStore>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn IngestStore>) -> Self {
        Self { store }
    }

    /// Resolve a raw key to its credential and enforce revocation and the
    /// origin allow-list. `last_used_at` is updated in a detached task.
    pub async fn authenticate(
        &self,
        raw_key: Option<&str>,
        origin: Option<&str>,
    ) -> Result<Credential, IngestError> {
        let raw_key = raw_key.map(str::trim).filter(|k| !k.is_empty()).ok_or(IngestError::InvalidCredential)?;

        let credential = self
            .store
            .find_credential(&hash_key(raw_key))
            .await?
            .ok_or(IngestError::InvalidCredential)?;

        if credential.is_revoked() {
            tracing::debug!(credential_id = %credential.id, "Rejected revoked credential");
            return Err(IngestError::InvalidCredential);
        }

        if !credential.allows_origin(origin) {
            let origin = origin.unwrap_or_default().to_string();
            tracing::debug!(credential_id = %credential.id, origin = %origin, "Origin not allowed");
            return Err(IngestError::OriginNotAllowed { origin });
        }

        let store = Arc::clone(&self.store);
        let id = credential.id;
        tokio::spawn(async move {
            if let Err(err) = store.touch_credential(id, Utc::now()).await {
                tracing::warn!(credential_id = %id, error = %err, "Failed to update last_used_at");
            }
        });

        Ok(credential)
    }
}

/// Key from `Authorization: Bearer <key>`, falling back to `x-api-key`.
pub fn extract_api_key<'a>(authorization: Option<&'a str>, x_api_key: Option<&'a str>) -> Option<&'a str> {
    authorization
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
        })
        .filter(|token| !token.is_empty())
        .or_else(|| x_api_key.map(str::trim).filter(|k| !k.is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::credentials::seed_credentials;
    use crate::modules::memory_store::MemoryStore;
    use feedback_types::models::SeedCredential;
    use feedback_types::PlanTier;

    const KEY: &str = "fk_live_0123456789abcdef";

    async fn authenticator(origins: Vec<String>) -> (Authenticator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let seeds = vec![SeedCredential {
            key: KEY.into(),
            tenant_id: "acme".into(),
            project_id: "web".into(),
            plan: PlanTier::Pro,
            allowed_origins: origins,
        }];
        seed_credentials(store.as_ref(), &seeds).await.unwrap();
        (Authenticator::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_valid_key_resolves_credential() {
        let (auth, _) = authenticator(vec![]).await;
        let credential = auth.authenticate(Some(KEY), Some("https://any.test")).await.unwrap();
        assert_eq!(credential.tenant_id, "acme");
        assert_eq!(credential.plan, PlanTier::Pro);
    }

    #[tokio::test]
    async fn test_unknown_or_missing_key_rejected() {
        let (auth, _) = authenticator(vec![]).await;
        assert_eq!(auth.authenticate(Some("fk_live_wrong"), None).await.unwrap_err(), IngestError::InvalidCredential);
        assert_eq!(auth.authenticate(None, None).await.unwrap_err(), IngestError::InvalidCredential);
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let (auth, store) = authenticator(vec![]).await;
        let mut credential = store.find_credential(&hash_key(KEY)).await.unwrap().unwrap();
        credential.revoked_at = Some(Utc::now());
        store.upsert_credential(&hash_key(KEY), &credential).await.unwrap();

        assert_eq!(auth.authenticate(Some(KEY), None).await.unwrap_err(), IngestError::InvalidCredential);
    }

    #[tokio::test]
    async fn test_origin_allow_list() {
        let (auth, _) = authenticator(vec!["https://acme.test".into()]).await;
        assert!(auth.authenticate(Some(KEY), Some("https://acme.test")).await.is_ok());
        assert!(auth.authenticate(Some(KEY), None).await.is_ok());

        let err = auth.authenticate(Some(KEY), Some("https://evil.test")).await.unwrap_err();
        assert_eq!(err.code(), "ORIGIN_NOT_ALLOWED");
    }

    #[test]
    fn test_extract_api_key() {
        assert_eq!(extract_api_key(Some("Bearer abc"), None), Some("abc"));
        assert_eq!(extract_api_key(Some("bearer  abc "), None), Some("abc"));
        assert_eq!(extract_api_key(Some("Basic abc"), Some("xyz")), Some("xyz"));
        assert_eq!(extract_api_key(None, Some("xyz")), Some("xyz"));
        assert_eq!(extract_api_key(None, None), None);
    }
}
