use std::time::Duration;

/// Largest exponent applied to the base delay; attempts beyond this wait the
/// same as attempt `MAX_BACKOFF_EXPONENT + 1`.
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Exponential backoff: `base * 2^(attempt-1)`, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay (None = exponent clamp only).
    pub max_delay: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max_delay: Some(Duration::from_secs(30)),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Wait before retry number `attempt` (1 = first retry). Attempt 0 waits nothing.
    pub fn wait(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(MAX_BACKOFF_EXPONENT);
        let raw = self.base.saturating_mul(1u32 << exp);
        match self.max_delay {
            Some(cap) => raw.min(cap),
            None => raw,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Retry budget plus backoff schedule for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::new(Duration::ZERO),
        }
    }

    /// Decide what to do after a failure.
    ///
    /// `attempts_used` counts attempts already made, including the one that
    /// just failed (so it is >= 1 here).
    pub fn decide(&self, attempts_used: u32, retryable: bool) -> RetryDecision {
        if !retryable || attempts_used > self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff.wait(attempts_used))
    }
}
