//! Idempotency key generation and backfill.

use uuid::Uuid;

use crate::runner::WorkItem;

/// Produces an idempotency key for the item at `index`.
pub trait IdempotencyKeys: Send + Sync {
    fn key(&self, index: usize) -> String;
}

/// `{prefix}-{uuid v4}-{index}` keys.
#[derive(Debug, Clone)]
pub struct UuidKeys {
    prefix: String,
}

impl UuidKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidKeys {
    fn default() -> Self {
        Self::new("batch")
    }
}

impl IdempotencyKeys for UuidKeys {
    fn key(&self, index: usize) -> String {
        format!("{}-{}-{}", self.prefix, Uuid::new_v4(), index)
    }
}

/// Fill in missing (or empty) keys; caller-provided keys are kept. Returns how many were filled.
pub fn backfill_keys<P>(items: &mut [WorkItem<P>], keys: &dyn IdempotencyKeys) -> usize {
    let mut filled = 0;
    for item in items.iter_mut() {
        if item.idempotency_key.as_deref().map_or(true, str::is_empty) {
            item.idempotency_key = Some(keys.key(item.index));
            filled += 1;
        }
    }
    filled
}
