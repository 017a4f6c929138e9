//! Publish metrics for event sinks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a sink and whoever wants to observe it.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total events published.
    pub events_published: AtomicU64,
    /// Total publish failures.
    pub publish_failures: AtomicU64,
    /// Events published while nobody was listening.
    pub events_unobserved: AtomicU64,
    /// Total payload bytes published.
    pub bytes_published: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_publish(&self, bytes: u64) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unobserved(&self) {
        self.events_unobserved.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            events_unobserved: self.events_unobserved.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub publish_failures: u64,
    pub events_unobserved: u64,
    pub bytes_published: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = SinkMetrics::new();
        metrics.record_publish(10);
        metrics.record_publish(5);
        metrics.record_publish_failure();
        metrics.record_unobserved();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_published, 2);
        assert_eq!(snapshot.bytes_published, 15);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.events_unobserved, 1);
    }
}
