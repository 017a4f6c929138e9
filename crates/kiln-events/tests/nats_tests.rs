//! NATS sink integration tests.
//!
//! Run with: `cargo test -p kiln-events --test nats_tests --features integration`

#![cfg(feature = "integration")]

use futures::StreamExt;
use kiln_core::build::{Build, TriggerKind};
use kiln_core::events::Event;
use kiln_core::ports::EventSink;
use kiln_events::NatsEventSink;
use std::time::Duration;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::nats::Nats;

#[tokio::test]
async fn test_events_arrive_on_prefixed_subjects() {
    let container = Nats::default()
        .with_tag("2.10-alpine")
        .start()
        .await
        .expect("Failed to start nats");
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(4222).await.unwrap();
    let url = format!("nats://{}:{}", host, port);

    let sink = NatsEventSink::connect(&url).await.unwrap();
    let mut sub = sink.client().subscribe("kiln.>").await.unwrap();
    sink.client().flush().await.unwrap();

    let build = Build::new(TriggerKind::Manual, "user");
    sink.publish(Event::BuildStart(build.clone())).await.unwrap();
    sink.publish(Event::log(build.id, "Build pipeline started"))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.subject.as_str(), "kiln.build.start");

    let second = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second.subject.as_str(),
        format!("kiln.log.{}", build.id.as_uuid())
    );
    let event: Event = serde_json::from_slice(&second.payload).unwrap();
    assert_eq!(event, Event::log(build.id, "Build pipeline started"));

    assert_eq!(sink.metrics().snapshot().events_published, 2);
    assert!(sink.is_connected());
}

#[tokio::test]
async fn test_shutdown_drains_pending_publishes() {
    let container = Nats::default()
        .with_tag("2.10-alpine")
        .start()
        .await
        .expect("Failed to start nats");
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(4222).await.unwrap();
    let url = format!("nats://{}:{}", host, port);

    let observer = async_nats::connect(&url).await.unwrap();
    let mut sub = observer.subscribe("kiln.>").await.unwrap();
    observer.flush().await.unwrap();

    let sink = NatsEventSink::connect(&url).await.unwrap();
    let build = Build::new(TriggerKind::Webhook, "ci");
    sink.publish(Event::BuildStart(build)).await.unwrap();
    sink.shutdown().await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.subject.as_str(), "kiln.build.start");
}
