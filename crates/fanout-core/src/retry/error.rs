//! Error types produced by a single remote call.

use std::fmt;

use super::classify::{classify_status, ErrorKind};

/// Error returned when the shared cancellation token fires before an attempt
/// starts or while waiting out a backoff delay.
///
/// Every error type the engine drives must implement `From<Cancelled>` so
/// cancellation can be reported through the caller's own error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Classified failure of one remote call.
///
/// Callers that have no error type of their own can map transport failures
/// into this; [`is_retryable`](super::is_retryable) is the matching predicate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP-style status code, when the failure came from a response.
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Build an error from a response status; the kind is derived from the code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: classify_status(status),
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Stable label used when grouping failures in a batch summary.
    pub fn category(&self) -> &'static str {
        self.kind.label()
    }
}

impl From<Cancelled> for RemoteError {
    fn from(_: Cancelled) -> Self {
        Self::new(ErrorKind::Cancelled, Cancelled.to_string())
    }
}
