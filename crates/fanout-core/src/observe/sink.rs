//! Event sinks and the panic-safe emitter the engine calls them through.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::event::Event;

/// Receives engine events.
///
/// Called synchronously on the task that finished the unit of work, so
/// implementations must return quickly and must not block.
pub trait EventSink: Send + Sync {
    fn record_event(&self, event: &Event);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record_event(&self, _event: &Event) {}
}

/// Logs events through `tracing` (info on success, warn on failure).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record_event(&self, event: &Event) {
        let duration_ms = event.duration.as_secs_f64() * 1000.0;
        match &event.error {
            None => tracing::info!(
                operation = %event.operation,
                entity = %event.entity_type,
                position = event.position,
                completed = event.progress.completed,
                failed = event.progress.failed,
                total = ?event.progress.total,
                duration_ms,
                has_next = event.has_next,
                "unit completed"
            ),
            Some(err) => tracing::warn!(
                operation = %event.operation,
                entity = %event.entity_type,
                position = event.position,
                completed = event.progress.completed,
                failed = event.progress.failed,
                total = ?event.progress.total,
                duration_ms,
                error = %err,
                "unit failed"
            ),
        }
    }
}

/// Forwards events into a bounded channel; drops them when the channel is full
/// or closed rather than waiting for the consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn record_event(&self, event: &Event) {
        let _ = self.tx.try_send(event.clone());
    }
}

/// Adapts a closure into a sink (callback-style progress reporting).
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(&Event) + Send + Sync,
{
    fn record_event(&self, event: &Event) {
        (self.0)(event)
    }
}

/// Handle the engine emits through. A panicking sink is contained and logged.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn EventSink>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

impl Emitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, event: &Event) {
        if catch_unwind(AssertUnwindSafe(|| self.sink.record_event(event))).is_err() {
            tracing::warn!(operation = %event.operation, "event sink panicked; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fn_sink_receives_events() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let emitter = Emitter::new(Arc::new(FnSink(move |_: &Event| {
            s.fetch_add(1, Ordering::Relaxed);
        })));
        emitter.emit(&Event::new("batch_item", "transaction", 0));
        emitter.emit(&Event::new("batch_item", "transaction", 1));
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn panicking_sink_is_contained() {
        let emitter = Emitter::new(Arc::new(FnSink(|_: &Event| panic!("sink bug"))));
        emitter.emit(&Event::new("fetch_page", "listing", 1));
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        sink.record_event(&Event::new("batch_item", "transaction", 0));
        sink.record_event(&Event::new("batch_item", "transaction", 1));
        assert_eq!(rx.try_recv().unwrap().position, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn noop_sink_is_default() {
        Emitter::default().emit(&Event::new("batch_item", "transaction", 0).with_error(Some("x".into())));
    }
}
