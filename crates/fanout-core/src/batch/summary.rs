//! Aggregate statistics over a batch outcome.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::RemoteError;
use crate::runner::BatchOutcome;

/// Counts, success rate and failure breakdown for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Percentage of successful items in [0.0, 100.0]; 0 for an empty batch.
    pub success_rate: f64,
    /// Failure count per category label.
    pub error_categories: BTreeMap<String, usize>,
    /// Attempts summed over every item (retries included).
    pub total_attempts: u64,
    /// Sum of per-item durations (not wall time: items overlap).
    pub total_duration: Duration,
    pub average_duration: Duration,
}

/// Summarize `outcome`, grouping failures with `categorize`.
pub fn summarize<R, E, C>(outcome: &BatchOutcome<R, E>, categorize: C) -> BatchSummary
where
    C: Fn(&E) -> String,
{
    let total = outcome.results.len();
    let mut success_count = 0;
    let mut error_categories = BTreeMap::new();
    let mut total_attempts = 0u64;
    let mut total_duration = Duration::ZERO;

    for r in &outcome.results {
        total_attempts += u64::from(r.attempts);
        total_duration += r.duration;
        match &r.outcome {
            Ok(_) => success_count += 1,
            Err(e) => *error_categories.entry(categorize(e)).or_insert(0) += 1,
        }
    }

    let success_rate = if total == 0 {
        0.0
    } else {
        success_count as f64 * 100.0 / total as f64
    };
    let average_duration = if total == 0 {
        Duration::ZERO
    } else {
        total_duration / total as u32
    };

    BatchSummary {
        total,
        success_count,
        error_count: total - success_count,
        success_rate,
        error_categories,
        total_attempts,
        total_duration,
        average_duration,
    }
}

impl<R> BatchOutcome<R, RemoteError> {
    /// Summary grouped by [`RemoteError::category`].
    pub fn summary(&self) -> BatchSummary {
        summarize(self, |e| e.category().to_string())
    }
}
