//! Connection Registry
//!
//! Process-local map from connection handle to the outbound queue of
//! the socket it represents. The presence registry (Redis) answers
//! "which handle is this identity reachable at"; this map answers
//! "push a frame onto that handle's socket".

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::application::services::ConnectionSink;

/// One outbound wire frame: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

impl OutboundFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// All live connections on this process, keyed by handle.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, mpsc::UnboundedSender<OutboundFrame>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue under its handle.
    pub fn register(&self, handle: String, sender: mpsc::UnboundedSender<OutboundFrame>) {
        self.connections.insert(handle, sender);
    }

    /// Drop a connection; idempotent.
    pub fn unregister(&self, handle: &str) {
        self.connections.remove(handle);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl ConnectionSink for ConnectionRegistry {
    fn deliver(&self, handle: &str, event: &str, payload: &Value) -> bool {
        match self.connections.get(handle) {
            Some(sender) => sender
                .send(OutboundFrame::new(event, payload.clone()))
                .is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deliver_to_registered_connection() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("conn-1".into(), tx);

        assert!(registry.deliver("conn-1", "typing", &json!({"from": "7"})));

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.event, "typing");
        assert_eq!(frame.data["from"], "7");
    }

    #[test]
    fn test_deliver_to_unknown_handle_reports_dead() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.deliver("nope", "typing", &json!({})));
    }

    #[test]
    fn test_unregister_makes_handle_dead() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("conn-1".into(), tx);
        assert_eq!(registry.connection_count(), 1);

        registry.unregister("conn-1");
        assert!(!registry.deliver("conn-1", "typing", &json!({})));
        assert_eq!(registry.connection_count(), 0);
    }
}
