//! Fixed-size partitioning and concurrent execution of sub-batches.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::retry::Cancelled;
use crate::runner::{run_bounded, BatchOutcome, ItemResult, WorkItem};

/// Partition `items` into contiguous chunks of at most `max_batch_size`
/// (clamped to >= 1). The last chunk may be shorter; empty input gives no chunks.
pub fn split_batches<P>(items: Vec<WorkItem<P>>, max_batch_size: usize) -> Vec<Vec<WorkItem<P>>> {
    let max = max_batch_size.max(1);
    let mut out = Vec::with_capacity(items.len().div_ceil(max));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        out.push(iter.by_ref().take(max).collect());
    }
    out
}

/// Split `items` and run every sub-batch concurrently, each through its own
/// [`run_bounded`] with `limit` slots.
///
/// Peak concurrency is therefore `limit * number_of_sub_batches`. Results are
/// concatenated in sub-batch order, so overall ordering matches submission.
/// A failure in one sub-batch never cancels the others; the earliest
/// sub-batch's `first_error` becomes the merged one. Only `ctx` cancellation
/// stops every sub-batch.
pub async fn execute_split<P, R, E, F, Fut>(
    ctx: &CancellationToken,
    items: Vec<WorkItem<P>>,
    max_batch_size: usize,
    limit: usize,
    stop_on_error: bool,
    process: Arc<F>,
) -> BatchOutcome<R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: From<Cancelled> + Send + 'static,
    F: Fn(CancellationToken, WorkItem<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ItemResult<R, E>> + Send + 'static,
{
    let batches = split_batches(items, max_batch_size);
    let batch_count = batches.len();
    tracing::debug!(batch_count, max_batch_size, limit, "executing split batches");

    let handles: Vec<_> = batches
        .into_iter()
        .map(|batch| {
            let ctx = ctx.clone();
            let process = Arc::clone(&process);
            tokio::spawn(async move { run_bounded(&ctx, batch, limit, stop_on_error, process).await })
        })
        .collect();

    let mut merged = BatchOutcome::default();
    let mut panic_payload = None;
    for (n, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => {
                if let Some(index) = outcome.first_error {
                    tracing::debug!(sub_batch = n, failed_index = index, "sub-batch reported failure");
                }
                merged.append(outcome);
            }
            Err(e) if e.is_panic() => {
                if panic_payload.is_none() {
                    panic_payload = Some(e.into_panic());
                }
            }
            Err(e) => tracing::warn!(sub_batch = n, "sub-batch task ended without a result: {}", e),
        }
    }
    if let Some(payload) = panic_payload {
        std::panic::resume_unwind(payload);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RemoteError;
    use crate::runner::enumerate_items;
    use std::time::Duration;

    #[test]
    fn split_even() {
        let chunks = split_batches(enumerate_items(0..9), 3);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 3));
        assert_eq!(chunks[1][0].index, 3);
    }

    #[test]
    fn split_remainder_goes_last() {
        let chunks = split_batches(enumerate_items(0..10), 4);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(chunks[2][1].index, 9);
    }

    #[test]
    fn split_small_and_empty() {
        assert_eq!(split_batches(enumerate_items(0..3), 100).len(), 1);
        assert!(split_batches(Vec::<WorkItem<u8>>::new(), 10).is_empty());
        assert_eq!(split_batches(enumerate_items(0..3), 0).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn split_results_stay_in_order() {
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            // Reverse finishing order inside and across sub-batches.
            tokio::time::sleep(Duration::from_millis(50 - item.payload)).await;
            ItemResult::<u64, RemoteError>::success(item.index, item.payload, Duration::ZERO, 1)
        });
        let outcome =
            execute_split(&CancellationToken::new(), enumerate_items(0..25), 10, 3, false, process).await;
        assert_eq!(outcome.len(), 25);
        for (i, r) in outcome.results.iter().enumerate() {
            assert_eq!(r.index, i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_in_one_sub_batch_does_not_stop_others() {
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if item.index == 1 {
                ItemResult::failure(item.index, RemoteError::validation("bad"), Duration::ZERO, 1)
            } else {
                ItemResult::success(item.index, (), Duration::ZERO, 1)
            }
        });
        let outcome =
            execute_split(&CancellationToken::new(), enumerate_items(0..12), 4, 1, true, process).await;
        assert_eq!(outcome.first_error, Some(1));
        // Second and third sub-batches ran to completion.
        assert_eq!(outcome.results.iter().filter(|r| r.index >= 4).count(), 8);
        assert!(outcome.results.iter().filter(|r| r.index >= 4).all(|r| r.is_success()));
    }
}
