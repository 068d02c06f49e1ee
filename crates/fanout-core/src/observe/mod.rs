//! Progress and observability events.
//!
//! The engine reports one [`Event`] after every batch item completes and
//! after every page fetch. Events go to an injected [`EventSink`]; the
//! default [`NoopSink`] keeps the engine free of any telemetry dependency.

mod event;
mod progress;
mod sink;

pub use event::Event;
pub use progress::{ProgressStats, ProgressTracker};
pub use sink::{ChannelSink, Emitter, EventSink, FnSink, NoopSink, TracingSink};
