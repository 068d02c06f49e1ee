//! In-process stand-in for a paginated listing endpoint.

#![allow(dead_code)]

use std::future::Ready;
use std::sync::{Arc, Mutex};

use fanout_core::paginate::{PageOptions, PageResult};
use fanout_core::retry::RemoteError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Never returns a cursor.
    Offset,
    /// Always returns a cursor while more items remain.
    Cursor,
    /// Offset paging for the first `n` pages, then starts returning cursors.
    CursorAfter(usize),
}

#[derive(Debug)]
pub struct FakeListing {
    items: Vec<String>,
    mode: Mode,
    report_total: bool,
    fail_on_request: Option<usize>,
    requests: Mutex<Vec<PageOptions>>,
}

impl FakeListing {
    pub fn new(count: usize, mode: Mode) -> Self {
        Self {
            items: (1..=count).map(|i| format!("item{}", i)).collect(),
            mode,
            report_total: true,
            fail_on_request: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    /// Make the `n`th request (0-based) fail with a 500.
    pub fn fail_on_request(mut self, n: usize) -> Self {
        self.fail_on_request = Some(n);
        self
    }

    pub fn requests(&self) -> Vec<PageOptions> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetch(&self, opts: PageOptions) -> Result<PageResult<String>, RemoteError> {
        let request_no = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(opts.clone());
            requests.len() - 1
        };
        if self.fail_on_request == Some(request_no) {
            return Err(RemoteError::from_status(500, "listing unavailable"));
        }

        let start = match &opts.cursor {
            Some(c) => c.trim_start_matches("pos-").parse::<usize>().unwrap_or(0),
            None => opts.offset as usize,
        }
        .min(self.items.len());
        let end = (start + opts.limit as usize).min(self.items.len());
        let has_more = end < self.items.len();

        let mut page = PageResult::new(self.items[start..end].to_vec(), has_more);
        if self.report_total {
            page = page.with_total(self.items.len() as u64);
        }
        let give_cursor = match self.mode {
            Mode::Offset => false,
            Mode::Cursor => true,
            Mode::CursorAfter(n) => request_no + 1 >= n,
        };
        if give_cursor && has_more {
            page = page.with_next_cursor(format!("pos-{}", end));
        }
        Ok(page)
    }

    pub fn fetcher(
        self: &Arc<Self>,
    ) -> impl Fn(CancellationToken, PageOptions) -> Ready<Result<PageResult<String>, RemoteError>> {
        let listing = Arc::clone(self);
        move |_ctx: CancellationToken, opts: PageOptions| std::future::ready(listing.fetch(opts))
    }
}
