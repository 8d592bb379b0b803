#![doc = include_str!("../README.md")]

mod client;
mod error;
mod retry;
mod session;
mod types;

pub use client::{new_idempotency_key, FeedbackClient, IDEMPOTENCY_KEY_HEADER};
pub use error::ClientError;
pub use retry::{backoff_delay, RetryTransport};
pub use session::{FeedbackSession, SubmissionState};
pub use types::*;
