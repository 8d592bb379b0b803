//! Core domain models for feedback ingestion.
//!
//! Shared between the collection endpoint and the embeddable client.

mod config;
mod credential;
mod response;
mod submission;
mod usage;

pub use config::{
    IdempotencyConfig, IngestConfig, NotificationConfig, PlanLimits, PlansConfig, SeedCredential,
};
pub use credential::{Credential, PlanTier};
pub use response::{FeedbackResponse, ResponseMode, ResponsePatch, Vote};
pub use submission::{
    CheckExistingResponse, ClientContext, EndUser, RateLimitInfo, SubmissionStatus, SubmitRequest,
    SubmitResponse,
};
pub use usage::{next_billing_reset, UsageCounter};
