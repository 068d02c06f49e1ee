//! `fanout paginate` – walk a synthetic listing.

use anyhow::Result;
use fanout_core::config::EngineConfig;
use fanout_core::observe::TracingSink;
use fanout_core::paginate::{PageOptions, PageResult, Paginator};
use fanout_core::retry::{is_retryable, RemoteError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::cli::ListMode;

const PAGE_LATENCY: Duration = Duration::from_millis(5);

/// Page of the synthetic listing `1..=total`. Cursors are `pos-<offset>`.
fn synthetic_page(total: usize, cursor_mode: bool, opts: &PageOptions) -> PageResult<u64> {
    let start = match &opts.cursor {
        Some(c) => c.trim_start_matches("pos-").parse::<usize>().unwrap_or(0),
        None => opts.offset as usize,
    }
    .min(total);
    let end = (start + opts.limit as usize).min(total);
    let items = (start..end).map(|i| i as u64 + 1).collect();
    let page = PageResult::new(items, end < total).with_total(total as u64);
    if cursor_mode && end < total {
        page.with_next_cursor(format!("pos-{}", end))
    } else {
        page
    }
}

pub async fn run_paginate(
    cfg: &EngineConfig,
    total: usize,
    page_size: Option<u32>,
    cursor_mode: bool,
    mode: ListMode,
    workers: usize,
) -> Result<()> {
    let mut options = cfg.page_options();
    if let Some(limit) = page_size {
        options.limit = limit;
    }
    let fetch = move |_ctx: CancellationToken, opts: PageOptions| async move {
        tokio::time::sleep(PAGE_LATENCY).await;
        Ok::<_, RemoteError>(synthetic_page(total, cursor_mode, &opts))
    };
    let pager = Paginator::new(fetch, options)
        .with_retry(cfg.retry_policy(), is_retryable)
        .with_entity_type("record")
        .with_sink(Arc::new(TracingSink));

    let ctx = CancellationToken::new();
    let started = Instant::now();
    let (count, sum) = match mode {
        ListMode::All => {
            let items = pager.all(&ctx).await?;
            (items.len() as u64, items.iter().sum::<u64>())
        }
        ListMode::Foreach => {
            let (mut count, mut sum) = (0u64, 0u64);
            pager
                .for_each(&ctx, |item| {
                    count += 1;
                    sum += item;
                    Ok(())
                })
                .await?;
            (count, sum)
        }
        ListMode::Concurrent => {
            let count = Arc::new(AtomicU64::new(0));
            let sum = Arc::new(AtomicU64::new(0));
            let (c, s) = (Arc::clone(&count), Arc::clone(&sum));
            pager
                .concurrent(&ctx, workers, move |_ctx, item: u64| {
                    c.fetch_add(1, Ordering::Relaxed);
                    s.fetch_add(item, Ordering::Relaxed);
                    async { Ok::<_, RemoteError>(()) }
                })
                .await?;
            (count.load(Ordering::Relaxed), sum.load(Ordering::Relaxed))
        }
    };

    let info = pager.page_info();
    println!(
        "{} item(s) over {} page(s) ({:?} mode) in {:.2}s, checksum {}",
        count,
        info.page_number,
        mode,
        started.elapsed().as_secs_f64(),
        sum
    );
    Ok(())
}
