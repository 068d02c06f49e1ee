//! Retry and backoff policy.
//!
//! This module encapsulates error classification (validation, throttling,
//! network failures, 5xx) and exponential backoff decisions so that higher
//! layers (runner, batch executor, paginator) share a consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify_status, is_retryable, ErrorKind};
pub use error::{Cancelled, RemoteError};
pub use policy::{Backoff, RetryDecision, RetryPolicy, MAX_BACKOFF_EXPONENT};
pub use run::{execute, AttemptRecord, Attempted};
