//! # Feedback Types
//!
//! Wire types, domain models, and error definitions for the feedback ingestion
//! protocol.
//!
//! - **`error`** - Typed errors with HTTP status / error code mapping
//! - **`models`** - Credentials, plan tiers, response events, submission bodies,
//!   usage counters, and configuration
//!
//! ## Architecture Role
//!
//! ```text
//!                feedback-types (this crate)
//!                        │
//!       ┌────────────────┼────────────────┐
//!       ▼                ▼                ▼
//!  feedback-core   feedback-client   feedback-server
//! ```
//!
//! The client and the server share these bodies so the wire contract is
//! defined exactly once.

pub mod error;
pub mod models;

pub use error::{ConfigError, ErrorBody, ErrorEnvelope, IngestError, Result};

pub use models::{
    CheckExistingResponse, ClientContext, Credential, EndUser, FeedbackResponse, IngestConfig,
    PlanTier, RateLimitInfo, ResponseMode, ResponsePatch, SubmissionStatus, SubmitRequest,
    SubmitResponse, UsageCounter, Vote,
};
