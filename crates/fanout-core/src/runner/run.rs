//! Semaphore-bounded dispatch of work items onto tokio tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::item::{BatchOutcome, ItemResult, WorkItem};
use crate::retry::Cancelled;

/// Runs `process` over `items` with at most `limit` (clamped to >= 1) tasks in
/// flight, returning results ordered by submission position.
///
/// With `stop_on_error` the first failing result stops admission of further
/// items; tasks already in flight are left to finish and their results are
/// kept. Without it every item runs and the outcome holds one result per item.
///
/// Items that never get a slot because `ctx` was cancelled are reported as
/// failed with [`Cancelled`]. A panicking task is resumed on the caller once
/// the remaining tasks have drained.
pub async fn run_bounded<P, R, E, F, Fut>(
    ctx: &CancellationToken,
    items: Vec<WorkItem<P>>,
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
    let limit = limit.max(1);
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(limit));
    // Capacity 1 with try_send: only the first failure is kept.
    let (abort_tx, mut abort_rx) = mpsc::channel::<usize>(1);
    let mut slots: Vec<Option<ItemResult<R, E>>> =
        std::iter::repeat_with(|| None).take(total).collect();
    let mut join_set = JoinSet::new();
    let mut first_error = None;
    let mut aborted = false;

    for (slot, item) in items.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            slots[slot] = Some(ItemResult::failure(
                item.index,
                Cancelled.into(),
                Duration::ZERO,
                0,
            ));
            continue;
        };

        if stop_on_error {
            if let Ok(index) = abort_rx.try_recv() {
                tracing::debug!(failed_index = index, "stop-on-error: no further items admitted");
                first_error = Some(index);
                aborted = true;
                break;
            }
        }

        let process = Arc::clone(&process);
        let abort_tx = abort_tx.clone();
        let task_ctx = ctx.clone();
        tracing::trace!(index = item.index, slot, "dispatching item");
        join_set.spawn(async move {
            let _permit = permit;
            let result = process(task_ctx, item).await;
            if stop_on_error && !result.is_success() {
                let _ = abort_tx.try_send(result.index);
            }
            (slot, result)
        });
    }
    drop(abort_tx);

    let mut panic_payload = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((slot, result)) => slots[slot] = Some(result),
            Err(e) if e.is_panic() => {
                if panic_payload.is_none() {
                    panic_payload = Some(e.into_panic());
                }
            }
            Err(e) => tracing::warn!("item task ended without a result: {}", e),
        }
    }
    if let Some(payload) = panic_payload {
        std::panic::resume_unwind(payload);
    }

    if stop_on_error && first_error.is_none() {
        first_error = abort_rx.try_recv().ok();
    }

    let results: Vec<ItemResult<R, E>> = slots.into_iter().flatten().collect();
    tracing::debug!(
        submitted = total,
        finished = results.len(),
        limit,
        first_error = ?first_error,
        "bounded run finished"
    );
    BatchOutcome {
        results,
        first_error,
        aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RemoteError;
    use crate::runner::enumerate_items;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn items(n: u64) -> Vec<WorkItem<u64>> {
        enumerate_items(0..n)
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_submission_order() {
        let ctx = CancellationToken::new();
        // Later items finish first.
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            tokio::time::sleep(Duration::from_millis(100 - item.payload * 10)).await;
            ItemResult::<u64, RemoteError>::success(item.index, item.payload * 2, Duration::ZERO, 1)
        });
        for limit in 1..=10 {
            let outcome = run_bounded(&ctx, items(10), limit, false, Arc::clone(&process)).await;
            assert_eq!(outcome.len(), 10);
            for (i, r) in outcome.results.iter().enumerate() {
                assert_eq!(r.index, i);
                assert_eq!(r.value(), Some(&(i as u64 * 2)));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let process = Arc::new(move |_ctx: CancellationToken, item: WorkItem<u64>| {
            let (f, p) = (Arc::clone(&f), Arc::clone(&p));
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                ItemResult::<(), RemoteError>::success(item.index, (), Duration::ZERO, 1)
            }
        });
        let outcome = run_bounded(&CancellationToken::new(), items(20), 4, false, process).await;
        assert_eq!(outcome.len(), 20);
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn continue_on_error_keeps_every_item() {
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if item.index % 3 == 0 {
                ItemResult::failure(item.index, RemoteError::validation("bad"), Duration::ZERO, 1)
            } else {
                ItemResult::success(item.index, item.payload, Duration::ZERO, 1)
            }
        });
        let outcome = run_bounded(&CancellationToken::new(), items(10), 3, false, process).await;
        assert_eq!(outcome.len(), 10);
        assert_eq!(outcome.failure_count(), 4);
        assert!(outcome.first_error.is_none());
        assert!(!outcome.aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_on_error_stops_admitting() {
        let started = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&started);
        let process = Arc::new(move |_ctx: CancellationToken, item: WorkItem<u64>| {
            let s = Arc::clone(&s);
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                if item.index == 2 {
                    ItemResult::failure(item.index, RemoteError::unprocessable("no"), Duration::ZERO, 1)
                } else {
                    ItemResult::success(item.index, (), Duration::ZERO, 1)
                }
            }
        });
        let outcome = run_bounded(&CancellationToken::new(), items(20), 2, true, process).await;
        assert_eq!(outcome.first_error, Some(2));
        assert!(outcome.aborted);
        assert!(outcome.len() < 20);
        assert!(started.load(Ordering::SeqCst) < 20);
        assert!(outcome.results.windows(2).all(|w| w[0].index < w[1].index));
        assert!(outcome.first_error_result().is_some_and(|r| !r.is_success()));
    }

    #[tokio::test]
    async fn cancelled_context_reports_every_item() {
        let ctx = CancellationToken::new();
        ctx.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let process = Arc::new(move |_ctx: CancellationToken, item: WorkItem<u64>| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { ItemResult::<(), RemoteError>::success(item.index, (), Duration::ZERO, 1) }
        });
        let outcome = run_bounded(&ctx, items(5), 2, false, process).await;
        assert_eq!(outcome.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.error().is_some_and(|e| e.is_cancelled())));
    }

    #[tokio::test]
    async fn zero_limit_is_clamped() {
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            ItemResult::<u64, RemoteError>::success(item.index, item.payload, Duration::ZERO, 1)
        });
        let outcome = run_bounded(&CancellationToken::new(), items(3), 0, false, process).await;
        assert_eq!(outcome.success_count(), 3);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_outcome() {
        let process = Arc::new(|_ctx: CancellationToken, item: WorkItem<u64>| async move {
            ItemResult::<u64, RemoteError>::success(item.index, item.payload, Duration::ZERO, 1)
        });
        let outcome = run_bounded(&CancellationToken::new(), Vec::new(), 4, true, process).await;
        assert!(outcome.is_empty());
        assert!(outcome.first_error.is_none());
    }
}
