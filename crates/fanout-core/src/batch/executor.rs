//! Batch executor: composes keys, retries, bounded runs and events for one submission.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::keys::{backfill_keys, IdempotencyKeys, UuidKeys};
use super::split::execute_split;
use crate::config::EngineConfig;
use crate::observe::{Emitter, Event, EventSink, ProgressTracker};
use crate::retry::{self, Cancelled, RetryPolicy};
use crate::runner::{enumerate_items, run_bounded, BatchOutcome, ItemResult, WorkItem};

/// Batch-level failure returned next to the full outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// Continue-on-error run finished with at least one failed item.
    #[error("{failed} of {total} item(s) failed")]
    ItemsFailed { failed: usize, total: usize },
    /// Stop-on-error run saw a failure; later items may not have run.
    #[error("stopped after item {index} failed ({finished} of {total} item(s) finished)")]
    Stopped {
        index: usize,
        finished: usize,
        total: usize,
    },
}

/// Outcome of [`BatchExecutor::submit`]. The ordered results are always kept,
/// even when `error` is set.
#[derive(Debug)]
pub struct BatchReport<R, E> {
    pub outcome: BatchOutcome<R, E>,
    pub error: Option<BatchError>,
}

impl<R, E> BatchReport<R, E> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs caller payloads through the engine with explicit configuration.
pub struct BatchExecutor {
    concurrency: usize,
    max_batch_size: usize,
    stop_on_error: bool,
    retry: RetryPolicy,
    keys: Arc<dyn IdempotencyKeys>,
    emitter: Emitter,
    entity_type: String,
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("concurrency", &self.concurrency)
            .field("max_batch_size", &self.max_batch_size)
            .field("stop_on_error", &self.stop_on_error)
            .field("retry", &self.retry)
            .field("entity_type", &self.entity_type)
            .finish_non_exhaustive()
    }
}

impl BatchExecutor {
    /// Executor with UUID idempotency keys and no event sink.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            concurrency: config.effective_concurrency(),
            max_batch_size: config.max_batch_size.max(1),
            stop_on_error: config.stop_on_error,
            retry: config.retry_policy(),
            keys: Arc::new(UuidKeys::new(config.idempotency_key_prefix.clone())),
            emitter: Emitter::default(),
            entity_type: "item".to_string(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.emitter = Emitter::new(sink);
        self
    }

    pub fn with_keys(mut self, keys: Arc<dyn IdempotencyKeys>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Index `payloads` by position and run them. See [`Self::submit_items`].
    pub async fn submit<P, R, E, C, Fut, Q>(
        &self,
        ctx: &CancellationToken,
        payloads: Vec<P>,
        call: C,
        is_retryable: Q,
    ) -> BatchReport<R, E>
    where
        P: Send + Sync + 'static,
        R: Send + 'static,
        E: From<Cancelled> + fmt::Display + Send + 'static,
        C: Fn(CancellationToken, Arc<WorkItem<P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        Q: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.submit_items(ctx, enumerate_items(payloads), call, is_retryable)
            .await
    }

    /// Run prepared work items.
    ///
    /// Missing idempotency keys are backfilled first. Each item goes through
    /// the retry executor with this executor's policy; `call` is invoked once
    /// per attempt with the same item. Submissions larger than
    /// `max_batch_size` are split into concurrently running sub-batches.
    ///
    /// One `batch_item` event is emitted per item that started. Items never
    /// admitted because `ctx` was cancelled still get a `Cancelled` result
    /// but no event, so on a cancelled batch the event stream stops short of
    /// `completed == total`; use the returned outcome for the final counts.
    pub async fn submit_items<P, R, E, C, Fut, Q>(
        &self,
        ctx: &CancellationToken,
        mut items: Vec<WorkItem<P>>,
        call: C,
        is_retryable: Q,
    ) -> BatchReport<R, E>
    where
        P: Send + Sync + 'static,
        R: Send + 'static,
        E: From<Cancelled> + fmt::Display + Send + 'static,
        C: Fn(CancellationToken, Arc<WorkItem<P>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        Q: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let total = items.len();
        let filled = backfill_keys(&mut items, self.keys.as_ref());
        tracing::info!(
            entity = %self.entity_type,
            total,
            keys_filled = filled,
            concurrency = self.concurrency,
            max_batch_size = self.max_batch_size,
            stop_on_error = self.stop_on_error,
            "batch submitted"
        );

        let tracker = Arc::new(ProgressTracker::new(Some(total as u64)));
        let call = Arc::new(call);
        let is_retryable = Arc::new(is_retryable);
        let policy = self.retry;
        let emitter = self.emitter.clone();
        let entity_type: Arc<str> = Arc::from(self.entity_type.as_str());

        let process = Arc::new(move |ctx: CancellationToken, item: WorkItem<P>| {
            let call = Arc::clone(&call);
            let is_retryable = Arc::clone(&is_retryable);
            let tracker = Arc::clone(&tracker);
            let emitter = emitter.clone();
            let entity_type = Arc::clone(&entity_type);
            async move {
                let index = item.index;
                let item = Arc::new(item);
                let attempted = retry::execute(
                    &ctx,
                    &policy,
                    |e: &E| is_retryable(e),
                    |c| call(c, Arc::clone(&item)),
                )
                .await;
                let result = ItemResult::from_attempted(index, attempted);
                let progress = tracker.record(1, result.is_success());
                emitter.emit(
                    &Event::new("batch_item", &*entity_type, index as u64)
                        .with_progress(progress)
                        .with_duration(result.duration)
                        .with_error(result.error().map(ToString::to_string))
                        .with_has_next(progress.completed < total as u64),
                );
                result
            }
        });

        let outcome = if total > self.max_batch_size {
            execute_split(
                ctx,
                items,
                self.max_batch_size,
                self.concurrency,
                self.stop_on_error,
                process,
            )
            .await
        } else {
            run_bounded(ctx, items, self.concurrency, self.stop_on_error, process).await
        };

        let failed = outcome.failure_count();
        let error = match outcome.first_error {
            Some(index) => Some(BatchError::Stopped {
                index,
                finished: outcome.len(),
                total,
            }),
            None if failed > 0 => Some(BatchError::ItemsFailed { failed, total }),
            None => None,
        };
        match &error {
            None => tracing::info!(entity = %self.entity_type, total, "batch completed"),
            Some(e) => tracing::warn!(entity = %self.entity_type, total, failed, "batch completed with errors: {}", e),
        }
        BatchReport { outcome, error }
    }
}
