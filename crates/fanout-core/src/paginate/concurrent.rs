//! Concurrent consumption: sequential page fetches feeding a worker pool.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::pager::Paginator;
use super::types::{PageOptions, PageResult};
use crate::retry::Cancelled;

impl<T, E, F, Fut> Paginator<T, E, F>
where
    F: Fn(CancellationToken, PageOptions) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, E>>,
    T: Send + 'static,
    E: From<Cancelled> + fmt::Display + Clone + Send + 'static,
{
    /// Apply `f` to every remaining item on up to `workers` tasks, in no
    /// particular order.
    ///
    /// Pages are fetched on the calling task only, so position state has a
    /// single writer. Items flow to the workers over a bounded channel; the
    /// first `f` error cancels the shared token, stops feeding, and is
    /// returned; a page fetch still in flight at that point is abandoned and
    /// leaves the paginator state untouched. Otherwise the pagination error,
    /// if any, is returned, then [`Cancelled`] if `ctx` fired.
    pub async fn concurrent<G, GFut>(
        &self,
        ctx: &CancellationToken,
        workers: usize,
        f: G,
    ) -> Result<(), E>
    where
        G: Fn(CancellationToken, T) -> GFut + Send + Sync + 'static,
        GFut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let workers = workers.max(1);
        let shared = ctx.child_token();
        let f = Arc::new(f);
        let (item_tx, item_rx) = mpsc::channel::<T>(workers);
        let item_rx = Arc::new(Mutex::new(item_rx));
        let (err_tx, mut err_rx) = mpsc::channel::<E>(1);

        let mut join_set = JoinSet::new();
        for _ in 0..workers {
            let f = Arc::clone(&f);
            let rx = Arc::clone(&item_rx);
            let err_tx = err_tx.clone();
            let token = shared.clone();
            join_set.spawn(async move {
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(item) = next else { break };
                    if let Err(e) = f(token.clone(), item).await {
                        let _ = err_tx.try_send(e);
                        token.cancel();
                        break;
                    }
                }
            });
        }
        drop(err_tx);

        let mut pending = self.take_items();
        'feed: loop {
            for item in pending.drain(..) {
                tokio::select! {
                    biased;
                    _ = shared.cancelled() => break 'feed,
                    sent = item_tx.send(item) => {
                        if sent.is_err() {
                            break 'feed;
                        }
                    }
                }
            }
            if shared.is_cancelled() {
                break;
            }
            // The fetch sees only the caller's token. A worker failure drops
            // the in-flight fetch instead of recording it as a fetch error.
            let more = tokio::select! {
                biased;
                _ = shared.cancelled() => false,
                more = self.next(ctx) => more,
            };
            if !more || shared.is_cancelled() {
                break;
            }
            pending = self.take_items();
        }
        drop(item_tx);

        let mut panic_payload = None;
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() && panic_payload.is_none() {
                    panic_payload = Some(e.into_panic());
                }
            }
        }
        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }

        if let Ok(e) = err_rx.try_recv() {
            tracing::warn!(error = %e, "worker failed; listing consumption stopped");
            return Err(e);
        }
        if let Some(e) = self.err() {
            return Err(e);
        }
        if ctx.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}
