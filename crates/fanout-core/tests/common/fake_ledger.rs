//! In-process stand-in for a remote ledger that creates transactions.
//!
//! Tracks attempts per item, peak concurrency, and idempotency keys, and can
//! be told to fail specific items permanently or for the first N attempts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fanout_core::retry::{Cancelled, RemoteError};
use fanout_core::runner::WorkItem;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub account: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub index: usize,
    pub idempotency_key: String,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub enum Failure {
    /// Every attempt fails with this error.
    Always(RemoteError),
    /// The first `times` attempts fail with a 503.
    Transient { times: u32 },
}

pub type CallFuture = Pin<Box<dyn Future<Output = Result<Receipt, RemoteError>> + Send>>;

#[derive(Debug, Default)]
pub struct FakeLedger {
    latency: Duration,
    failures: HashMap<usize, Failure>,
    attempts: Mutex<HashMap<usize, u32>>,
    keys: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeLedger {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn fail(mut self, index: usize, failure: Failure) -> Self {
        self.failures.insert(index, failure);
        self
    }

    pub fn attempts(&self, index: usize) -> u32 {
        self.attempts.lock().unwrap().get(&index).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub async fn create(
        &self,
        ctx: CancellationToken,
        item: Arc<WorkItem<Transaction>>,
    ) -> Result<Receipt, RemoteError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(item.index).or_insert(0);
            *n += 1;
            *n
        };
        let key = item.idempotency_key.clone().unwrap_or_default();
        self.keys.lock().unwrap().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let finished = tokio::select! {
            _ = ctx.cancelled() => false,
            _ = tokio::time::sleep(self.latency) => true,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !finished {
            return Err(Cancelled.into());
        }

        match self.failures.get(&item.index) {
            Some(Failure::Always(e)) => Err(e.clone()),
            Some(Failure::Transient { times }) if attempt <= *times => {
                Err(RemoteError::from_status(503, "ledger busy"))
            }
            _ => Ok(Receipt {
                index: item.index,
                idempotency_key: key,
                amount: item.payload.amount,
            }),
        }
    }

    /// Unit-of-work closure for `BatchExecutor::submit`.
    pub fn caller(
        self: &Arc<Self>,
    ) -> impl Fn(CancellationToken, Arc<WorkItem<Transaction>>) -> CallFuture + Send + Sync + 'static {
        let ledger = Arc::clone(self);
        move |ctx, item| {
            let ledger = Arc::clone(&ledger);
            Box::pin(async move { ledger.create(ctx, item).await })
        }
    }
}

pub fn transactions(n: usize) -> Vec<Transaction> {
    (0..n)
        .map(|i| Transaction {
            account: format!("acct-{}", i % 4),
            amount: 100 + i as i64,
        })
        .collect()
}
