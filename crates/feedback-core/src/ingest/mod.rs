//! Ingestion pipeline: dedup, rate limiting, usage accounting, existing
//! response resolution, and the coordinator tying them together.

pub mod auth;
pub mod coordinator;
pub mod idempotency;
pub mod notify;
pub mod prometheus;
pub mod rate_limit;
pub mod resolver;
pub mod usage;
pub mod validation;


pub use auth::Authenticator;
pub use idempotency::{IdempotencyCache, IdempotencyCheck};
pub use notify::{LogNotifier, UsageAlert, UsageNotifier, WebhookNotifier};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use resolver::ExistingResponseResolver;
pub use usage::UsageTracker;
