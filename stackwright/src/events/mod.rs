//! Event sinks for stack event delivery.
//!
//! The event poller hands each event to a [`StackEventSink`]. Slow
//! consumers should sit behind a [`ChannelEventSink`] so the poller never
//! waits on rendering.

mod channel;
mod sink;

pub use channel::{BackpressureMetrics, ChannelEventSink};
pub use sink::{CollectingEventSink, LoggingEventSink, NoOpEventSink, StackEventSink};
