//! Connection Registry Tests
//!
//! The registry is the local delivery surface the notification router
//! fans out through; these tests cover its contract as seen through
//! the `ConnectionSink` trait.

use serde_json::json;
use tokio::sync::mpsc;

use chatme_server::application::services::ConnectionSink;
use chatme_server::presentation::websocket::{ConnectionRegistry, OutboundFrame};

#[test]
fn test_outbound_frame_wire_shape() {
    let frame = OutboundFrame::new("receive_message", json!({"text": "hi"}));
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value, json!({"event": "receive_message", "data": {"text": "hi"}}));
}

#[tokio::test]
async fn test_frames_arrive_in_delivery_order() {
    let registry = ConnectionRegistry::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("conn-1".into(), tx);

    let sink: &dyn ConnectionSink = &registry;
    for i in 0..3 {
        assert!(sink.deliver("conn-1", "receive_message", &json!({"seq": i})));
    }

    for i in 0..3 {
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.data["seq"], i);
    }
}

#[tokio::test]
async fn test_closed_receiver_counts_as_dead_handle() {
    let registry = ConnectionRegistry::new();
    let (tx, rx) = mpsc::unbounded_channel::<OutboundFrame>();
    registry.register("conn-1".into(), tx);

    // The socket side went away without unregistering yet.
    drop(rx);

    assert!(!registry.deliver("conn-1", "typing", &json!({})));
}
