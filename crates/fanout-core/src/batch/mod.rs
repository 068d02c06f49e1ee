//! Batch submission: splitting, concurrent sub-batches, and summaries.
//!
//! Pipeline for one submission: index payloads → backfill idempotency keys →
//! split when larger than `max_batch_size` → bounded runner per sub-batch →
//! retry executor per item → ordered outcome plus aggregate error.

mod executor;
mod keys;
mod split;
mod summary;

pub use executor::{BatchError, BatchExecutor, BatchReport};
pub use keys::{backfill_keys, IdempotencyKeys, UuidKeys};
pub use split::{execute_split, split_batches};
pub use summary::{summarize, BatchSummary};
