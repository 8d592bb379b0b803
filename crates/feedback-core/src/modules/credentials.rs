//! Credential key hashing and startup seeding.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use feedback_types::models::SeedCredential;
use feedback_types::Credential;

use crate::modules::repository::{IngestStore, StoreResult};

/// Hex SHA-256 digest under which a raw API key is stored.
pub fn hash_key(raw_key: &str) -> String {
    format!("{:x}", Sha256::digest(raw_key.as_bytes()))
}

/// Register seed credentials from configuration. Existing keys keep their id.
pub async fn seed_credentials(
    store: &dyn IngestStore,
    seeds: &[SeedCredential],
) -> StoreResult<usize> {
    for seed in seeds {
        let credential = Credential {
            id: Uuid::new_v4(),
            tenant_id: seed.tenant_id.clone(),
            project_id: seed.project_id.clone(),
            plan: seed.plan,
            revoked_at: None,
            last_used_at: None,
            allowed_origins: seed.allowed_origins.clone(),
        };
        let stored = store.upsert_credential(&hash_key(&seed.key), &credential).await?;
        tracing::debug!(
            credential_id = %stored.id,
            tenant_id = %stored.tenant_id,
            plan = %stored.plan,
            "Seeded credential"
        );
    }
    Ok(seeds.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::MemoryStore;
    use feedback_types::PlanTier;

    #[test]
    fn test_hash_key_is_stable_hex() {
        let digest = hash_key("fk_live_0123456789abcdef");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_key("fk_live_0123456789abcdef"));
        assert_ne!(digest, hash_key("fk_live_0123456789abcdeg"));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        let seeds = vec![SeedCredential {
            key: "fk_live_0123456789abcdef".into(),
            tenant_id: "acme".into(),
            project_id: "web".into(),
            plan: PlanTier::Business,
            allowed_origins: vec!["https://acme.test".into()],
        }];

        seed_credentials(&store, &seeds).await.unwrap();
        let first = store.find_credential(&hash_key(&seeds[0].key)).await.unwrap().unwrap();
        seed_credentials(&store, &seeds).await.unwrap();
        let second = store.find_credential(&hash_key(&seeds[0].key)).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.plan, PlanTier::Business);
    }
}
