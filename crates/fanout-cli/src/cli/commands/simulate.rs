//! `fanout simulate` – push a synthetic batch through the executor.

use anyhow::Result;
use fanout_core::batch::BatchExecutor;
use fanout_core::config::EngineConfig;
use fanout_core::observe::{ChannelSink, Event};
use fanout_core::retry::{is_retryable, Cancelled, RemoteError};
use fanout_core::runner::WorkItem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub items: usize,
    pub latency_ms: u64,
    pub fail_every: usize,
    pub flaky_every: usize,
    pub json: bool,
}

/// True for every `n`th item (1-based), never when `n` is 0.
fn every(n: usize, index: usize) -> bool {
    n > 0 && (index + 1) % n == 0
}

/// One simulated remote call: sleep, then reject or succeed per the cadences.
async fn remote_call(
    ctx: CancellationToken,
    item: Arc<WorkItem<u64>>,
    attempt: u32,
    latency: Duration,
    fail_every: usize,
    flaky_every: usize,
) -> Result<u64, RemoteError> {
    tokio::select! {
        _ = ctx.cancelled() => return Err(Cancelled.into()),
        _ = tokio::time::sleep(latency) => {}
    }
    if every(fail_every, item.index) {
        return Err(RemoteError::unprocessable(format!("item {} rejected", item.index)));
    }
    if every(flaky_every, item.index) && attempt == 1 {
        return Err(RemoteError::from_status(503, "service busy"));
    }
    Ok(item.payload * 2)
}

pub async fn run_simulate(cfg: &EngineConfig, args: &SimulateArgs) -> Result<()> {
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<Event>(64);
    const PROGRESS_INTERVAL_MS: u64 = 500;
    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(event) = event_rx.recv().await {
            let stats = event.progress;
            let now = Instant::now();
            if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS
                || !event.has_next
            {
                let pct = stats.fraction().unwrap_or(0.0) * 100.0;
                let eta = stats
                    .eta_secs()
                    .map(|s| format!("{:.0}s", s))
                    .unwrap_or_else(|| "?".to_string());
                eprintln!(
                    "  {} / {} done ({:.1}%), {} failed  {:.1} items/s  ETA {}",
                    stats.completed,
                    stats.total.unwrap_or(0),
                    pct,
                    stats.failed,
                    stats.items_per_sec(),
                    eta
                );
                last_print = now;
            }
        }
    });

    let executor = BatchExecutor::new(cfg)
        .with_entity_type("synthetic")
        .with_sink(Arc::new(ChannelSink::new(event_tx)));

    let attempts: Arc<Vec<AtomicU32>> = Arc::new((0..args.items).map(|_| AtomicU32::new(0)).collect());
    let latency = Duration::from_millis(args.latency_ms);
    let (fail_every, flaky_every) = (args.fail_every, args.flaky_every);
    let call = move |ctx: CancellationToken, item: Arc<WorkItem<u64>>| {
        let attempt = attempts[item.index].fetch_add(1, Ordering::Relaxed) + 1;
        remote_call(ctx, item, attempt, latency, fail_every, flaky_every)
    };

    let started = Instant::now();
    let payloads: Vec<u64> = (0..args.items as u64).collect();
    let report = executor
        .submit(&CancellationToken::new(), payloads, call, is_retryable)
        .await;
    let elapsed = started.elapsed();

    // Dropping the executor closes the event channel and ends the printer.
    drop(executor);
    let _ = progress_handle.await;

    let summary = report.outcome.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} item(s): {} succeeded, {} failed ({:.1}% success) in {:.2}s",
            summary.total,
            summary.success_count,
            summary.error_count,
            summary.success_rate,
            elapsed.as_secs_f64()
        );
        println!(
            "attempts: {}  avg item time: {:.1}ms",
            summary.total_attempts,
            summary.average_duration.as_secs_f64() * 1000.0
        );
        for (category, count) in &summary.error_categories {
            println!("  {}: {}", category, count);
        }
    }
    if let Some(err) = &report.error {
        tracing::warn!("simulation finished with errors: {}", err);
        eprintln!("batch error: {}", err);
    }
    Ok(())
}
