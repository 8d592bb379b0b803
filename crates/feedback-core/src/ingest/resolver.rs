//! Existing-response resolution for an (element, end-user) pair.

use std::sync::Arc;

use feedback_types::FeedbackResponse;

use crate::modules::repository::{IngestStore, StoreResult};

#[derive(Clone)]
pub struct ExistingResponseResolver {
    store: Arc<dyn IngestStore>,
}

impl ExistingResponseResolver {
    pub fn new(store: Arc<dyn IngestStore>) -> Self {
        Self { store }
    }

    /// The stored response for this element and user, if any. Anonymous
    /// (absent or blank) users never resolve.
    pub async fn check_existing(
        &self,
        project_id: &str,
        element_id: &str,
        end_user_id: Option<&str>,
    ) -> StoreResult<Option<FeedbackResponse>> {
        let Some(user_id) = end_user_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        self.store.find_by_element_user(project_id, element_id, user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::memory_store::MemoryStore;
    use chrono::Utc;
    use feedback_types::{EndUser, ResponseMode, SubmitRequest};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_resolves_by_project_element_and_user() {
        let store = Arc::new(MemoryStore::new());
        let mut request = SubmitRequest::new("nps", ResponseMode::Feedback);
        request.rating = Some(5);
        request.user = Some(EndUser { id: Some("u1".into()), attributes: Default::default() });
        let row = FeedbackResponse::from_submission(Uuid::new_v4(), "p1", &request, None, false, Utc::now());
        store.insert_response(&row).await.unwrap();

        let resolver = ExistingResponseResolver::new(store);
        assert_eq!(resolver.check_existing("p1", "nps", Some("u1")).await.unwrap().unwrap().id, row.id);
        assert!(resolver.check_existing("p2", "nps", Some("u1")).await.unwrap().is_none());
        assert!(resolver.check_existing("p1", "other", Some("u1")).await.unwrap().is_none());
        assert!(resolver.check_existing("p1", "nps", Some(" ")).await.unwrap().is_none());
        assert!(resolver.check_existing("p1", "nps", None).await.unwrap().is_none());
    }
}
