//! Event sink backends for kiln.
//!
//! Provides:
//! - In-process broadcast for WebSocket observers
//! - NATS publishing for external consumers
//! - Fan-out to several sinks at once
//! - Publish metrics

pub mod broadcast;
pub mod config;
pub mod fanout;
pub mod metrics;
pub mod nats;

pub use broadcast::BroadcastEventSink;
pub use config::NatsConfig;
pub use fanout::FanoutEventSink;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use nats::NatsEventSink;
