//! Stored feedback response (the ingested event).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::submission::{ClientContext, SubmitRequest};

/// Kind of feedback element that produced the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseMode {
    Feedback,
    Vote,
    Poll,
    FeatureRequest,
    Ab,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Vote => "vote",
            Self::Poll => "poll",
            Self::FeatureRequest => "feature-request",
            Self::Ab => "ab",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(Self::Feedback),
            "vote" => Ok(Self::Vote),
            "poll" => Ok(Self::Poll),
            "feature-request" => Ok(Self::FeatureRequest),
            "ab" => Ok(Self::Ab),
            other => Err(format!("unknown response mode: {}", other)),
        }
    }
}

/// Up/down vote value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("unknown vote: {}", other)),
        }
    }
}

/// A persisted response row.
///
/// Created once; later submissions for the same (element, end-user) pair
/// overwrite only the mutable payload fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub project_id: String,
    pub element_id: String,
    pub mode: ResponseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_selected: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_user_id: Option<String>,
    #[serde(default)]
    pub end_user_attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ClientContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub gated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackResponse {
    /// Build a new row from a validated submission.
    pub fn from_submission(
        id: Uuid,
        project_id: &str,
        request: &SubmitRequest,
        idempotency_key: Option<String>,
        gated: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (end_user_id, end_user_attributes) = match &request.user {
            Some(user) => (user.known_id().map(str::to_string), user.attributes.clone()),
            None => (None, serde_json::Map::new()),
        };
        Self {
            id,
            project_id: project_id.to_string(),
            element_id: request.element_id.clone(),
            mode: request.mode,
            content: request.content.clone(),
            rating: request.rating,
            vote: request.vote,
            poll_options: request.poll_options.clone(),
            poll_selected: request.poll_selected.clone(),
            experiment_id: request.experiment_id.clone(),
            variant: request.variant.clone(),
            end_user_id,
            end_user_attributes,
            context: request.context.clone(),
            idempotency_key,
            gated,
            created_at,
            updated_at: created_at,
        }
    }

    /// Overwrite mutable payload fields in place. `created_at` is preserved.
    pub fn apply_patch(&mut self, patch: &ResponsePatch, now: DateTime<Utc>) {
        if let Some(content) = &patch.content {
            self.content = Some(content.clone());
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
        if let Some(vote) = patch.vote {
            self.vote = Some(vote);
        }
        if let Some(selected) = &patch.poll_selected {
            self.poll_selected = Some(selected.clone());
        }
        if let Some(variant) = &patch.variant {
            self.variant = Some(variant.clone());
        }
        if let Some(attributes) = &patch.end_user_attributes {
            self.end_user_attributes = attributes.clone();
        }
        self.updated_at = now;
    }
}

/// Mutable fields of an existing response. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePatch {
    #[validate(length(max = 10000_u64))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[validate(range(min = 1_u8, max = 5_u8))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_selected: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_user_attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ResponsePatch {
    /// Mutable fields carried by a full resubmission.
    pub fn from_submission(request: &SubmitRequest) -> Self {
        Self {
            content: request.content.clone(),
            rating: request.rating,
            vote: request.vote,
            poll_selected: request.poll_selected.clone(),
            variant: request.variant.clone(),
            end_user_attributes: request
                .user
                .as_ref()
                .filter(|u| !u.attributes.is_empty())
                .map(|u| u.attributes.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.rating.is_none()
            && self.vote.is_none()
            && self.poll_selected.is_none()
            && self.variant.is_none()
            && self.end_user_attributes.is_none()
    }
}
