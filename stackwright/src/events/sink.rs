//! Event sink trait and implementations.

use parking_lot::RwLock;
use tracing::{info, warn, Level};

use crate::core::{StackEvent, TailEvent};

/// Receives stack events as the poller produces them.
///
/// Delivery is synchronous and must not block: the poller calls
/// [`StackEventSink::deliver`] once per event, oldest first.
pub trait StackEventSink: Send + Sync {
    /// Delivers one item. Implementations never fail.
    fn deliver(&self, item: TailEvent);

    /// Delivers a stack event.
    fn deliver_event(&self, event: &StackEvent) {
        self.deliver(TailEvent::Event(event.clone()));
    }
}

/// A no-op sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl StackEventSink for NoOpEventSink {
    fn deliver(&self, _item: TailEvent) {}
}

/// A sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the specified level for events.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    fn log_event(&self, event: &StackEvent) {
        let reason = event.resource_status_reason.as_deref().unwrap_or_default();
        if self.level == Level::DEBUG {
            tracing::debug!(
                stack = %event.stack_name,
                resource = %event.logical_resource_id,
                resource_type = %event.resource_type,
                status = %event.resource_status,
                reason,
                "stack event"
            );
        } else {
            info!(
                stack = %event.stack_name,
                resource = %event.logical_resource_id,
                resource_type = %event.resource_type,
                status = %event.resource_status,
                reason,
                "stack event"
            );
        }
    }
}

impl StackEventSink for LoggingEventSink {
    fn deliver(&self, item: TailEvent) {
        match item {
            TailEvent::Event(event) => self.log_event(&event),
            TailEvent::Error(message) => warn!(error = %message, "event stream failed"),
        }
    }
}

/// A sink that keeps every delivered item, for tests and batch consumers.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    items: RwLock<Vec<TailEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected items.
    #[must_use]
    pub fn items(&self) -> Vec<TailEvent> {
        self.items.read().clone()
    }

    /// Returns only the collected stack events.
    #[must_use]
    pub fn events(&self) -> Vec<StackEvent> {
        self.items
            .read()
            .iter()
            .filter_map(TailEvent::as_event)
            .cloned()
            .collect()
    }

    /// Returns the collected error messages.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.items
            .read()
            .iter()
            .filter_map(|item| match item {
                TailEvent::Error(message) => Some(message.clone()),
                TailEvent::Event(_) => None,
            })
            .collect()
    }

    /// Returns the number of collected items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clears all collected items.
    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl StackEventSink for CollectingEventSink {
    fn deliver(&self, item: TailEvent) {
        self.items.write().push(item);
    }
}
