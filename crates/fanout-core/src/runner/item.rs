//! Work item, per-item result, and aggregate outcome types.

use std::time::Duration;

use crate::retry::Attempted;

/// One caller-submitted unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<P> {
    /// Position assigned at submission; results are reported at the same index.
    pub index: usize,
    pub payload: P,
    /// Backfilled by the batch executor when the caller left it empty.
    pub idempotency_key: Option<String>,
}

impl<P> WorkItem<P> {
    pub fn new(index: usize, payload: P) -> Self {
        Self {
            index,
            payload,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Wrap payloads as work items indexed by position.
pub fn enumerate_items<P>(payloads: impl IntoIterator<Item = P>) -> Vec<WorkItem<P>> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(i, p)| WorkItem::new(i, p))
        .collect()
}

/// Outcome of one work item.
#[derive(Debug)]
pub struct ItemResult<R, E> {
    pub index: usize,
    pub outcome: Result<R, E>,
    /// Wall time from the first attempt's start to the final outcome,
    /// backoff waits included. Zero for items that never started.
    pub duration: Duration,
    pub attempts: u32,
}

impl<R, E> ItemResult<R, E> {
    pub fn success(index: usize, value: R, duration: Duration, attempts: u32) -> Self {
        Self {
            index,
            outcome: Ok(value),
            duration,
            attempts,
        }
    }

    pub fn failure(index: usize, error: E, duration: Duration, attempts: u32) -> Self {
        Self {
            index,
            outcome: Err(error),
            duration,
            attempts,
        }
    }

    pub fn from_attempted(index: usize, attempted: Attempted<R, E>) -> Self {
        Self {
            index,
            outcome: attempted.outcome,
            duration: attempted.elapsed,
            attempts: attempted.attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&R> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }
}

/// Every item result for one submission, ordered by index.
#[derive(Debug)]
pub struct BatchOutcome<R, E> {
    pub results: Vec<ItemResult<R, E>>,
    /// Index of the failure that stopped admission (stop-on-error only).
    pub first_error: Option<usize>,
    /// True when items were left undispatched because of `first_error`.
    pub aborted: bool,
}

impl<R, E> Default for BatchOutcome<R, E> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            first_error: None,
            aborted: false,
        }
    }
}

impl<R, E> BatchOutcome<R, E> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Result reported for the item that stopped admission, if any.
    pub fn first_error_result(&self) -> Option<&ItemResult<R, E>> {
        let index = self.first_error?;
        self.results.iter().find(|r| r.index == index)
    }

    /// Append a later sub-batch, keeping the earliest `first_error`.
    pub(crate) fn append(&mut self, other: BatchOutcome<R, E>) {
        self.results.extend(other.results);
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
        self.aborted |= other.aborted;
    }

    pub fn into_results(self) -> Vec<ItemResult<R, E>> {
        self.results
    }
}
