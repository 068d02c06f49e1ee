//! Classify response statuses and remote errors into retry policy error kinds.

use std::fmt;

use super::error::RemoteError;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP statuses, transport failures or business errors into
/// these kinds; only the transient ones are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request was malformed or failed validation (400).
    Validation,
    /// Credentials missing or rejected (401, 403).
    Unauthorized,
    /// Target resource does not exist (404).
    NotFound,
    /// Conflicting state, e.g. duplicate idempotency key (409).
    Conflict,
    /// Business rule rejected the request, e.g. insufficient balance (422).
    Unprocessable,
    /// Server asked us to slow down (429, 503).
    RateLimited,
    /// Operation timed out (408 or client-side deadline on the call itself).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Network,
    /// Retryable 5xx response other than throttling.
    Server(u16),
    /// The shared cancellation token fired. Never retried.
    Cancelled,
    /// Any other error (not retried).
    Other,
}

impl ErrorKind {
    /// Whether the retry executor may spend budget on this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::Network | ErrorKind::Server(_)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Server(_) => "server",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Server(code) => write!(f, "server error {}", code),
            other => f.write_str(other.label()),
        }
    }
}

/// Classify a response status code.
pub fn classify_status(code: u16) -> ErrorKind {
    match code {
        400 => ErrorKind::Validation,
        401 | 403 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::Timeout,
        409 => ErrorKind::Conflict,
        422 => ErrorKind::Unprocessable,
        429 | 503 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Server(code),
        _ => ErrorKind::Other,
    }
}

/// Default retryability predicate for [`RemoteError`].
pub fn is_retryable(e: &RemoteError) -> bool {
    e.kind.is_retryable()
}
