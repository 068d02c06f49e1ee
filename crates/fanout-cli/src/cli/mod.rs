//! CLI for the fanout engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fanout_core::config::{self, EngineConfig};
use std::path::{Path, PathBuf};

use commands::{run_config, run_paginate, run_simulate, SimulateArgs};

/// Top-level CLI for the fanout engine.
#[derive(Debug, Parser)]
#[command(name = "fanout")]
#[command(about = "fanout: bounded, retrying, order-preserving remote call orchestration", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/fanout/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// How `fanout paginate` consumes the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListMode {
    /// Drain every page into one vector.
    All,
    /// Visit each item in order.
    Foreach,
    /// Process items on a worker pool.
    Concurrent,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit a batch of synthetic items against a simulated remote service.
    Simulate {
        /// Number of items in the batch.
        #[arg(long, default_value = "50", value_name = "N")]
        items: usize,
        /// Simulated latency of each remote call.
        #[arg(long, default_value = "20", value_name = "MS")]
        latency_ms: u64,
        /// Every Nth item is rejected permanently (0 = never).
        #[arg(long, default_value = "0", value_name = "N")]
        fail_every: usize,
        /// Every Nth item fails its first attempt with a retryable error (0 = never).
        #[arg(long, default_value = "0", value_name = "N")]
        flaky_every: usize,
        /// Override the configured concurrency limit.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Override the configured maximum sub-batch size.
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
        /// Stop admitting items after the first failure.
        #[arg(long)]
        stop_on_error: bool,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Walk a synthetic paginated listing.
    Paginate {
        /// Items in the listing.
        #[arg(long, default_value = "95", value_name = "N")]
        total: usize,
        /// Override the configured page size.
        #[arg(long, value_name = "N")]
        page_size: Option<u32>,
        /// Return continuation cursors instead of relying on offsets.
        #[arg(long)]
        cursor: bool,
        #[arg(long, value_enum, default_value = "all")]
        mode: ListMode,
        /// Worker count for `--mode concurrent`.
        #[arg(long, default_value = "4", value_name = "N")]
        workers: usize,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Simulate {
                items,
                latency_ms,
                fail_every,
                flaky_every,
                concurrency,
                batch_size,
                stop_on_error,
                json,
            } => {
                let args = SimulateArgs {
                    items,
                    latency_ms,
                    fail_every,
                    flaky_every,
                    json,
                };
                let mut cfg = cfg;
                if let Some(n) = concurrency {
                    cfg.concurrency = n;
                }
                if let Some(n) = batch_size {
                    cfg.max_batch_size = n;
                }
                cfg.stop_on_error |= stop_on_error;
                run_simulate(&cfg, &args).await?;
            }
            CliCommand::Paginate {
                total,
                page_size,
                cursor,
                mode,
                workers,
            } => run_paginate(&cfg, total, page_size, cursor, mode, workers).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
