//! The paginator state machine: Fresh → HasPage → Exhausted | Errored.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::types::{PageInfo, PageOptions, PageResult, PageState};
use crate::config::EngineConfig;
use crate::observe::{Emitter, Event, EventSink, ProgressStats};
use crate::retry::{self, Cancelled, RetryPolicy};

/// Lifecycle of a paginator. `Errored` is terminal: build a new paginator to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// No fetch yet.
    Fresh,
    /// Last fetch returned at least one item.
    HasPage,
    /// Source ran out (empty page or `has_more == false`).
    Exhausted,
    /// A fetch failed; the error is kept for [`Paginator::err`].
    Errored,
}

struct Inner<T, E> {
    state: PagerState,
    page: PageState,
    items: Vec<T>,
    error: Option<E>,
}

pub(super) enum Fetched<T, E> {
    Page(Vec<T>),
    End,
    Failed(E),
}

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Pull-based iterator over a page fetch function.
///
/// Page fetches are strictly sequential. All position state sits behind one
/// mutex that is never held across an `.await`.
pub struct Paginator<T, E, F> {
    fetch: F,
    inner: Mutex<Inner<T, E>>,
    retry: Option<(RetryPolicy, RetryPredicate<E>)>,
    emitter: Emitter,
    entity_type: String,
    started: Instant,
}

impl<T, E, F> fmt::Debug for Paginator<T, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Paginator")
            .field("state", &inner.state)
            .field("page", &inner.page)
            .field("entity_type", &self.entity_type)
            .finish_non_exhaustive()
    }
}

impl<T, E, F, Fut> Paginator<T, E, F>
where
    F: Fn(CancellationToken, PageOptions) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, E>>,
{
    pub fn new(fetch: F, options: PageOptions) -> Self {
        Self {
            fetch,
            inner: Mutex::new(Inner {
                state: PagerState::Fresh,
                page: PageState::new(&options),
                items: Vec::new(),
                error: None,
            }),
            retry: None,
            emitter: Emitter::default(),
            entity_type: "item".to_string(),
            started: Instant::now(),
        }
    }

    /// Paginator starting from the config's `[pagination]` defaults.
    pub fn from_config(fetch: F, config: &EngineConfig) -> Self {
        Self::new(fetch, config.page_options())
    }
}

impl<T, E, F> Paginator<T, E, F> {
    /// Retry transient page-fetch failures with `policy`.
    pub fn with_retry<Q>(mut self, policy: RetryPolicy, is_retryable: Q) -> Self
    where
        Q: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry = Some((policy, Arc::new(is_retryable)));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.emitter = Emitter::new(sink);
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PagerState {
        self.lock().state
    }

    pub fn page_state(&self) -> PageState {
        self.lock().page.clone()
    }

    pub fn page_info(&self) -> PageInfo {
        self.lock().page.info()
    }

    pub fn has_error(&self) -> bool {
        self.lock().error.is_some()
    }

    /// Move the current page's items out (they are not returned again).
    pub fn take_items(&self) -> Vec<T> {
        std::mem::take(&mut self.lock().items)
    }

    /// Options for the next fetch, or None when the listing is finished.
    fn next_request(&self) -> Option<PageOptions> {
        let mut inner = self.lock();
        match inner.state {
            PagerState::Exhausted | PagerState::Errored => None,
            _ if !inner.page.has_more => {
                inner.state = PagerState::Exhausted;
                inner.items.clear();
                None
            }
            _ => Some(inner.page.options()),
        }
    }

    /// Apply a fetch result to the state and emit the page event.
    fn record_fetch(&self, res: Result<PageResult<T>, E>, duration: Duration) -> Fetched<T, E>
    where
        E: Clone + fmt::Display,
    {
        let mut inner = self.lock();
        let attempted = inner.page.page_number + 1;
        let (fetched, error) = match res {
            Ok(page) if page.items.is_empty() => {
                inner.page.advance(&page);
                inner.state = PagerState::Exhausted;
                (Fetched::End, None)
            }
            Ok(mut page) => {
                inner.page.advance(&page);
                inner.state = PagerState::HasPage;
                (Fetched::Page(std::mem::take(&mut page.items)), None)
            }
            Err(e) => {
                inner.state = PagerState::Errored;
                inner.error = Some(e.clone());
                let msg = e.to_string();
                (Fetched::Failed(e), Some(msg))
            }
        };
        inner.items.clear();
        let event = Event::new("fetch_page", self.entity_type.as_str(), u64::from(attempted))
            .with_progress(ProgressStats {
                completed: inner.page.seen,
                failed: u64::from(error.is_some()),
                total: inner.page.total_known,
                elapsed_secs: self.started.elapsed().as_secs_f64(),
            })
            .with_duration(duration)
            .with_has_next(inner.state == PagerState::HasPage && inner.page.has_more)
            .with_error(error);
        drop(inner);
        self.emitter.emit(&event);
        fetched
    }
}

impl<T, E, F> Paginator<T, E, F>
where
    T: Clone,
{
    /// Clone of the current page's items.
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }
}

impl<T, E, F> Paginator<T, E, F>
where
    E: Clone,
{
    /// Error that moved the paginator to `Errored`, if any.
    pub fn err(&self) -> Option<E> {
        self.lock().error.clone()
    }
}

impl<T, E, F, Fut> Paginator<T, E, F>
where
    F: Fn(CancellationToken, PageOptions) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, E>>,
    E: From<Cancelled> + fmt::Display + Clone,
{
    async fn fetch_page(&self, ctx: &CancellationToken, options: PageOptions) -> Result<PageResult<T>, E> {
        match &self.retry {
            Some((policy, is_retryable)) => {
                retry::execute(ctx, policy, |e: &E| is_retryable(e), |c| {
                    (self.fetch)(c, options.clone())
                })
                .await
                .outcome
            }
            None if ctx.is_cancelled() => Err(Cancelled.into()),
            None => (self.fetch)(ctx.clone(), options).await,
        }
    }

    pub(super) async fn fetch_next(&self, ctx: &CancellationToken) -> Option<Fetched<T, E>> {
        let options = self.next_request()?;
        tracing::trace!(?options, entity = %self.entity_type, "fetching page");
        let started = Instant::now();
        let res = self.fetch_page(ctx, options).await;
        Some(self.record_fetch(res, started.elapsed()))
    }

    /// Fetch the next page. True when a non-empty page is now available via
    /// [`Self::items`] / [`Self::take_items`]; false when the listing is
    /// exhausted or a fetch failed (see [`Self::err`]).
    pub async fn next(&self, ctx: &CancellationToken) -> bool {
        match self.fetch_next(ctx).await {
            Some(Fetched::Page(items)) => {
                self.lock().items = items;
                true
            }
            Some(Fetched::End) | Some(Fetched::Failed(_)) | None => false,
        }
    }

    /// Fetch every remaining page and concatenate the items.
    ///
    /// Items of a page already returned through [`Self::next`] are not
    /// included. The first fetch error is returned (and kept for `err`).
    pub async fn all(&self, ctx: &CancellationToken) -> Result<Vec<T>, E> {
        if let Some(e) = self.err() {
            return Err(e);
        }
        let mut out = Vec::new();
        while let Some(fetched) = self.fetch_next(ctx).await {
            match fetched {
                Fetched::Page(items) => out.extend(items),
                Fetched::End => break,
                Fetched::Failed(e) => return Err(e),
            }
        }
        let info = self.page_info();
        tracing::debug!(
            entity = %self.entity_type,
            items = out.len(),
            pages = info.page_number,
            "listing drained"
        );
        Ok(out)
    }

    /// Apply `f` to every remaining item in order: first the current page's
    /// unconsumed items, then each following page.
    ///
    /// Stops at the first `f` error or when `ctx` is cancelled; otherwise
    /// returns the pagination error, if a fetch failed.
    pub async fn for_each<G>(&self, ctx: &CancellationToken, mut f: G) -> Result<(), E>
    where
        G: FnMut(T) -> Result<(), E>,
    {
        let mut batch = self.take_items();
        loop {
            for item in batch {
                if ctx.is_cancelled() {
                    return Err(Cancelled.into());
                }
                f(item)?;
            }
            if ctx.is_cancelled() {
                return Err(Cancelled.into());
            }
            if !self.next(ctx).await {
                break;
            }
            batch = self.take_items();
        }
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
