//! Retry loop: run an async unit of work until success or the policy says stop.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::Cancelled;
use super::policy::{RetryDecision, RetryPolicy};

/// One attempt of a unit of work. Logged, never stored.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRecord {
    /// 0-based attempt number.
    pub attempt: u32,
    pub started: Instant,
    pub elapsed: Duration,
    pub succeeded: bool,
    /// Classification of the failure (false on success).
    pub retryable: bool,
}

/// Final outcome of [`execute`].
#[derive(Debug)]
pub struct Attempted<R, E> {
    pub outcome: Result<R, E>,
    /// Attempts actually started (0 when cancelled before the first one).
    pub attempts: u32,
    /// Wall time from the first attempt's start to the final outcome,
    /// backoff waits included (runtime clock, so it follows a paused clock).
    pub elapsed: Duration,
}

/// Runs `unit` until it succeeds or the retry policy says to stop.
///
/// A failure ends the loop immediately when it is not retryable, when the
/// budget is spent, or when `ctx` is already cancelled. Otherwise the loop
/// sleeps for the backoff delay; cancellation during that wait returns
/// [`Cancelled`] instead of retrying.
pub async fn execute<R, E, F, Fut, P>(
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    is_retryable: P,
    mut unit: F,
) -> Attempted<R, E>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    P: Fn(&E) -> bool,
    E: From<Cancelled> + fmt::Display,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        if ctx.is_cancelled() {
            return Attempted {
                outcome: Err(Cancelled.into()),
                attempts,
                elapsed: started.elapsed(),
            };
        }

        let attempt_start = Instant::now();
        let res = unit(ctx.clone()).await;
        let record = AttemptRecord {
            attempt: attempts,
            started: attempt_start,
            elapsed: attempt_start.elapsed(),
            succeeded: res.is_ok(),
            retryable: match &res {
                Ok(_) => false,
                Err(e) => !ctx.is_cancelled() && is_retryable(e),
            },
        };
        attempts += 1;

        let err = match res {
            Ok(v) => {
                tracing::trace!(?record, "attempt succeeded");
                return Attempted {
                    outcome: Ok(v),
                    attempts,
                    elapsed: started.elapsed(),
                };
            }
            Err(e) => e,
        };

        match policy.decide(attempts, record.retryable) {
            RetryDecision::NoRetry => {
                tracing::debug!(?record, error = %err, "giving up");
                return Attempted {
                    outcome: Err(err),
                    attempts,
                    elapsed: started.elapsed(),
                };
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    attempt = record.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => {
                        return Attempted {
                            outcome: Err(Cancelled.into()),
                            attempts,
                            elapsed: started.elapsed(),
                        };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
