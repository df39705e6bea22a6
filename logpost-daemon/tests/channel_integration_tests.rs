//! Record channel integration tests.
//!
//! Tests the inter-module communication the daemon wires up:
//! tail-pipeline -> mpsc<RecordEvent> -> broker-publisher.

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use logpost_core::event::RecordEvent;
use logpost_core::record::Record;

#[tokio::test]
async fn test_record_event_channel_send_receive() {
    // Given: A bounded record channel
    let (tx, mut rx) = mpsc::channel::<RecordEvent>(16);

    // When: Sending a classified record
    let mut attributes = serde_json::Map::new();
    attributes.insert(
        "severity".to_owned(),
        serde_json::Value::String("error".to_owned()),
    );
    let record = Record::with_attributes("disk full on /dev/sda1", attributes);
    let event = RecordEvent::new(record, "/var/log/syslog");
    tx.send(event).await.expect("should send record event");

    // Then: Receiving yields the same line and source path
    let received = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("recv should not time out")
        .expect("channel should yield the event");
    assert_eq!(received.record.line, "disk full on /dev/sda1");
    assert_eq!(received.source_path, "/var/log/syslog");
    assert_eq!(received.metadata.source_module, "tail-pipeline");
}

#[tokio::test]
async fn test_record_event_json_shape_survives_channel() {
    // Given: A record with attributes
    let mut attributes = serde_json::Map::new();
    attributes.insert(
        "facility".to_owned(),
        serde_json::Value::String("kern".to_owned()),
    );
    let record = Record::with_attributes("watchdog reset", attributes);
    let (tx, mut rx) = mpsc::channel::<RecordEvent>(4);

    // When: Passing it through the channel and serializing
    tx.send(RecordEvent::new(record, "/var/log/kern.log"))
        .await
        .expect("should send");
    let received = rx.recv().await.expect("should receive");
    let json = received.record.to_json().expect("should serialize");

    // Then: The reserved line key leads and attributes follow
    assert!(
        json.starts_with("{\"string\""),
        "line key must come first, got: {}",
        json
    );
    assert!(json.contains("\"facility\":\"kern\""));
}

#[tokio::test]
async fn test_full_channel_rejects_try_send() {
    // Given: A channel at capacity
    let (tx, mut rx) = mpsc::channel::<RecordEvent>(1);
    tx.send(RecordEvent::new(Record::new("first"), "/var/log/a.log"))
        .await
        .expect("first send should succeed");

    // When: Trying to send without waiting
    let result = tx.try_send(RecordEvent::new(Record::new("second"), "/var/log/a.log"));

    // Then: The send is rejected, matching the tail pipeline's drop path
    assert!(result.is_err(), "try_send on a full channel should fail");

    // And: Draining frees capacity again
    let _ = rx.recv().await;
    tx.try_send(RecordEvent::new(Record::new("third"), "/var/log/a.log"))
        .expect("send should succeed after drain");
}

#[tokio::test]
async fn test_closed_channel_reports_to_sender() {
    // Given: A channel whose receiver is gone
    let (tx, rx) = mpsc::channel::<RecordEvent>(4);
    drop(rx);

    // When: Sending
    let result = tx
        .send(RecordEvent::new(Record::new("late line"), "/var/log/b.log"))
        .await;

    // Then: The sender observes the closure
    assert!(result.is_err(), "send to a closed channel should fail");
}

#[tokio::test]
async fn test_trace_id_links_events_across_modules() {
    // Given: A record event carrying an existing trace
    let original = RecordEvent::new(Record::new("request started"), "/var/log/app.log");
    let trace_id = original.metadata.trace_id.clone();

    // When: Creating a follow-up event bound to the same trace
    let follow_up = RecordEvent::with_trace(
        Record::new("request finished"),
        "/var/log/app.log",
        trace_id.clone(),
    );

    // Then: The trace id carries over while the event id stays unique
    assert_eq!(follow_up.metadata.trace_id, trace_id);
    assert_ne!(follow_up.id, original.id);
}
