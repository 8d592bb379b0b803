//! Request and response bodies of the ingestion endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::response::{FeedbackResponse, ResponseMode, Vote};

/// End-user identity attached to a submission. Everything besides `id` is
/// opaque attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EndUser {
    /// Non-blank user id, if the submission is not anonymous.
    pub fn known_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

/// Browser context captured by the embeddable client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Body of `POST /responses`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[validate(length(min = 1_u64, max = 255_u64))]
    pub element_id: String,
    pub mode: ResponseMode,
    #[validate(length(max = 10000_u64))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[validate(range(min = 1_u8, max = 5_u8))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_selected: Option<Vec<String>>,
    #[validate(length(max = 255_u64))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    #[validate(length(max = 255_u64))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EndUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ClientContext>,
}

impl SubmitRequest {
    /// Minimal request for a given element and mode; payload fields empty.
    pub fn new(element_id: impl Into<String>, mode: ResponseMode) -> Self {
        Self {
            element_id: element_id.into(),
            mode,
            content: None,
            rating: None,
            vote: None,
            poll_options: None,
            poll_selected: None,
            experiment_id: None,
            variant: None,
            user: None,
            context: None,
        }
    }

    /// Known end-user id, `None` for anonymous submissions.
    pub fn end_user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(EndUser::known_id)
    }
}

/// Outcome tag of an accepted submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// A new response row was persisted
    Created,
    /// The idempotency key was already seen; nothing was persisted
    Duplicate,
    /// An existing (element, end-user) response was edited in place
    Updated,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::Updated => "updated",
        }
    }
}

/// Success body of `POST /responses`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub id: Uuid,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

impl SubmitResponse {
    /// Same body, re-tagged as a duplicate.
    pub fn as_duplicate(&self) -> Self {
        Self { status: SubmissionStatus::Duplicate, ..self.clone() }
    }
}

/// Body of `GET /responses/check`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckExistingResponse {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<FeedbackResponse>,
}

impl From<Option<FeedbackResponse>> for CheckExistingResponse {
    fn from(response: Option<FeedbackResponse>) -> Self {
        Self { exists: response.is_some(), response }
    }
}

/// Rate-limit metadata returned with every checked request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Ceiling for the current window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Window reset time (unix seconds)
    pub reset_at: i64,
    /// Seconds until the window resets; 0 when not limited
    pub retry_after_secs: u64,
}
