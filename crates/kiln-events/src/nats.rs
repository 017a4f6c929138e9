//! NATS event publisher.

use crate::config::NatsConfig;
use crate::metrics::SinkMetrics;
use async_trait::async_trait;
use kiln_core::events::Event;
use kiln_core::ports::EventSink;
use kiln_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes build events as JSON on NATS subjects.
///
/// Subjects are `<prefix>.build.start`, `<prefix>.build.update.<build uuid>`
/// and `<prefix>.log.<build uuid>`, so consumers can follow one build with a
/// wildcard subscription.
#[derive(Clone)]
pub struct NatsEventSink {
    client: async_nats::Client,
    config: NatsConfig,
    metrics: Arc<SinkMetrics>,
}

impl NatsEventSink {
    /// Connect to a NATS server with default settings.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(NatsConfig::new(url)).await
    }

    /// Connect with custom configuration.
    pub async fn connect_with_config(config: NatsConfig) -> Result<Self> {
        let urls = config.urls.join(",");
        info!("Connecting to NATS at {}", urls);

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(config.connection_timeout)
            .request_timeout(Some(config.request_timeout))
            .connect(&urls)
            .await
            .map_err(|e| Error::EventBus(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS");

        Ok(Self {
            client,
            config,
            metrics: SinkMetrics::new(),
        })
    }

    /// Get the underlying NATS client.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    /// Drain pending publishes and close the connection.
    pub async fn shutdown(&self) -> Result<()> {
        self.client
            .drain()
            .await
            .map_err(|e| Error::EventBus(format!("Failed to drain NATS connection: {}", e)))
    }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn publish(&self, event: Event) -> Result<()> {
        let subject = self.config.subject_for(&event.subject());
        let payload = serde_json::to_vec(&event)?;
        let payload_len = payload.len() as u64;

        debug!(subject = %subject, event = event.name(), "Publishing event");

        match self.client.publish(subject.clone(), payload.into()).await {
            Ok(()) => {
                self.metrics.record_publish(payload_len);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_publish_failure();
                Err(Error::EventBus(format!(
                    "Failed to publish to {}: {}",
                    subject, e
                )))
            }
        }
    }
}
