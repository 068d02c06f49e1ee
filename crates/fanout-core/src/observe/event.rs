//! The structured record emitted after each batch item or page fetch.

use serde::Serialize;
use std::time::Duration;

use super::progress::ProgressStats;

/// Structured record of one completed unit (batch item or page fetch).
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// What ran, e.g. `"batch_item"` or `"fetch_page"`.
    pub operation: String,
    /// Caller-chosen entity label, e.g. `"transaction"`.
    pub entity_type: String,
    /// Item index for batches, 1-based page number for listings.
    pub position: u64,
    pub progress: ProgressStats,
    pub duration: Duration,
    pub error: Option<String>,
    pub has_next: bool,
}

impl Event {
    pub fn new(operation: impl Into<String>, entity_type: impl Into<String>, position: u64) -> Self {
        Self {
            operation: operation.into(),
            entity_type: entity_type.into(),
            position,
            progress: ProgressStats {
                completed: 0,
                failed: 0,
                total: None,
                elapsed_secs: 0.0,
            },
            duration: Duration::ZERO,
            error: None,
            has_next: false,
        }
    }

    pub fn with_progress(mut self, progress: ProgressStats) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn with_has_next(mut self, has_next: bool) -> Self {
        self.has_next = has_next;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
