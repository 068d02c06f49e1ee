//! Progress counters (items done, failures, rate, ETA).
//!
//! Consumers can compute rate = completed / elapsed_secs and
//! ETA = (total - completed) / rate.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Snapshot of progress for one batch or listing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressStats {
    /// Units finished so far (successes and failures).
    pub completed: u64,
    /// Units that finished with an error.
    pub failed: u64,
    /// Total units, when known (listings may never report one).
    pub total: Option<u64>,
    /// Elapsed time since the operation started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Completion rate in units per second (0 if elapsed is 0).
    pub fn items_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.completed as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if total unknown or rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total?.saturating_sub(self.completed);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.items_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], None if total unknown.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.completed as f64 / total as f64).min(1.0))
    }
}

/// Shared counters updated from concurrent tasks.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    completed: AtomicU64,
    failed: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Count `n` finished units and return the resulting snapshot.
    pub fn record(&self, n: u64, succeeded: bool) -> ProgressStats {
        if !succeeded {
            self.failed.fetch_add(n, Ordering::Relaxed);
        }
        self.completed.fetch_add(n, Ordering::Relaxed);
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressStats {
        ProgressStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total: self.total,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}
