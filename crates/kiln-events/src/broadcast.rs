//! In-process event broadcast.

use crate::metrics::SinkMetrics;
use async_trait::async_trait;
use kiln_core::Result;
use kiln_core::events::Event;
use kiln_core::ports::EventSink;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;

/// Fans events out to in-process subscribers such as WebSocket sessions.
///
/// Slow subscribers that fall more than `capacity` events behind miss
/// events; publishing never waits for them.
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<Event>,
    metrics: Arc<SinkMetrics>,
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            metrics: SinkMetrics::new(),
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: Event) -> Result<()> {
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(receivers, "Broadcast event");
                self.metrics.record_publish(0);
            }
            // Nobody listening is normal.
            Err(_) => self.metrics.record_unobserved(),
        }
        Ok(())
    }
}
