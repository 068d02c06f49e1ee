//! Bounded concurrency runner.
//!
//! Executes a list of work items on at most `limit` tokio tasks, keeps one
//! result per item in submission order, and either runs everything to
//! completion (best effort) or stops admitting work after the first failure.

mod item;
mod run;

pub use item::{enumerate_items, BatchOutcome, ItemResult, WorkItem};
pub use run::run_bounded;
