//! Channel-backed event sink with backpressure metrics.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

use super::StackEventSink;
use crate::core::TailEvent;

/// Metrics for backpressure monitoring.
#[derive(Debug, Default)]
pub struct BackpressureMetrics {
    delivered: AtomicU64,
    dropped: AtomicU64,
    last_drop_time: RwLock<Option<Instant>>,
}

impl BackpressureMetrics {
    /// Records a delivered item.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped item.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        *self.last_drop_time.write() = Some(Instant::now());
    }

    /// Returns the number of delivered items.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped items.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns when the last item was dropped.
    #[must_use]
    pub fn last_drop_time(&self) -> Option<Instant> {
        *self.last_drop_time.read()
    }

    /// Converts metrics to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "delivered": self.delivered(),
            "dropped": self.dropped(),
        })
    }
}

/// Forwards items into a bounded channel without ever blocking the poller.
///
/// A consumer task reads from the paired receiver at its own pace. When the
/// channel is full or closed the item is dropped and counted.
#[derive(Debug)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<TailEvent>,
    metrics: BackpressureMetrics,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver a consumer should drain.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TailEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                metrics: BackpressureMetrics::default(),
            },
            rx,
        )
    }

    /// Returns the metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BackpressureMetrics {
        &self.metrics
    }
}

impl StackEventSink for ChannelEventSink {
    fn deliver(&self, item: TailEvent) {
        match self.tx.try_send(item) {
            Ok(()) => self.metrics.record_delivery(),
            Err(err) => {
                self.metrics.record_drop();
                let reason = match err {
                    mpsc::error::TrySendError::Full(_) => "full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                };
                warn!(
                    reason,
                    dropped_total = self.metrics.dropped(),
                    "stack event dropped"
                );
            }
        }
    }
}
