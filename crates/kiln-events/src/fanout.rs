//! Publishing to several sinks at once.

use async_trait::async_trait;
use kiln_core::Result;
use kiln_core::events::Event;
use kiln_core::ports::EventSink;
use std::sync::Arc;
use tracing::warn;

/// Delivers every event to each inner sink in order.
///
/// A failing sink does not stop delivery to the ones after it. The first
/// error is returned once every sink has been tried.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn publish(&self, event: Event) -> Result<()> {
        let mut first_error = None;

        for (index, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.publish(event.clone()).await {
                warn!(sink = index, event = event.name(), error = %e, "Event sink failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastEventSink;
    use kiln_core::Error;
    use kiln_core::ids::BuildId;

    struct Failing;

    #[async_trait]
    impl EventSink for Failing {
        async fn publish(&self, _event: Event) -> Result<()> {
            Err(Error::EventBus("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let broadcast = BroadcastEventSink::new();
        let mut rx = broadcast.subscribe();
        let fanout = FanoutEventSink::new()
            .with_sink(Arc::new(Failing))
            .with_sink(Arc::new(broadcast.clone()));

        let event = Event::log(BuildId::new(), "hello");
        let result = fanout.publish(event.clone()).await;

        assert!(matches!(result, Err(Error::EventBus(_))));
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_empty_fanout() {
        let fanout = FanoutEventSink::new();
        assert!(fanout.is_empty());
        fanout
            .publish(Event::log(BuildId::new(), "nobody"))
            .await
            .unwrap();
    }
}
