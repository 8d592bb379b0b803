//! # Feedback Core
//!
//! Server-side ingestion protocol for feedback events.
//!
//! ```text
//! feedback-core/src/
//! ├── modules/          # storage: IngestStore trait, memory + PostgreSQL backends,
//! │                     # config loading, credential hashing
//! └── ingest/
//!     ├── validation.rs # per-mode payload rules
//!     ├── idempotency.rs# project-scoped response cache (dedup layer)
//!     ├── rate_limit.rs # per-credential fixed window, plan-scaled
//!     ├── usage.rs      # monthly usage counter with rollover
//!     ├── resolver.rs   # (element, end-user) existing-response lookup
//!     ├── notify.rs     # usage threshold notifications
//!     ├── auth.rs       # API key + origin checks
//!     ├── prometheus.rs # metric names and recorder
//!     └── coordinator.rs# submit / check / update orchestration
//! ```
//!
//! All cross-request state lives in the store; the coordinator itself holds no
//! shared mutable state and can be cloned behind an `Arc` into every handler.

#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::unnecessary_join,
        clippy::assertions_on_result_states
    )
)]

pub mod ingest;
pub mod modules;

pub use ingest::coordinator::{CheckOutcome, SubmissionCoordinator, SubmitOutcome, UpdateOutcome};
pub use modules::memory_store::MemoryStore;
pub use modules::pg_store::PostgresIngestStore;
pub use modules::repository::{IngestStore, StoreError, StoreResult};
