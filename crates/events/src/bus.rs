//! Event bus abstraction for decoupled event emission.
//!
//! Core components publish through `EventBus` so they can be exercised in
//! tests without any UI attached, and so a viewer process can subscribe to
//! the same events in-process.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

/// Trait for emitting events to subscribers.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name/topic (e.g., "history:changed")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// Serialize `payload` and emit it on `bus`.
///
/// Serialization failures are logged and the event is dropped.
pub fn emit_event<T: Serialize>(bus: &dyn EventBus, topic: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => bus.emit(topic, value),
        Err(e) => tracing::warn!(topic, error = %e, "failed to serialize event payload"),
    }
}

/// A captured event.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Captured events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.topic == topic)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push(EmittedEvent {
                topic: topic.to_string(),
                payload,
            });
        }
    }
}

/// Fan-out bus for in-process subscribers (viewers, CLI watchers).
#[derive(Clone)]
pub struct BroadcastEventBus {
    tx: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EventBus for BroadcastEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        tracing::debug!(topic, "event");
        // No subscribers is fine; the event is simply not observed.
        let _ = self.tx.send(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// No-op event bus that discards all events.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_event_bus() {
        let bus = InMemoryEventBus::new();

        bus.emit("history:changed", json!({"count": 1}));
        bus.emit("capture:failed", json!({"reason": "x"}));
        bus.emit("history:changed", json!({"count": 2}));

        assert_eq!(bus.len(), 3);
        assert_eq!(bus.events_for("history:changed").len(), 2);
        assert_eq!(bus.events_for("capture:failed").len(), 1);
        assert_eq!(bus.events_for("missing").len(), 0);

        bus.clear();
        assert!(bus.is_empty());
    }

    #[test]
    fn test_emit_event_serializes_payload() {
        #[derive(Serialize)]
        struct Payload {
            count: usize,
        }

        let bus = InMemoryEventBus::new();
        emit_event(&bus, "history:changed", &Payload { count: 4 });

        assert_eq!(bus.events()[0].payload, json!({"count": 4}));
    }

    #[tokio::test]
    async fn test_broadcast_bus_delivers_to_subscribers() {
        let bus = BroadcastEventBus::default();
        let mut rx = bus.subscribe();

        bus.emit("history:changed", json!({"count": 7}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "history:changed");
        assert_eq!(event.payload["count"], 7);
    }

    #[test]
    fn test_null_event_bus() {
        let bus = NullEventBus;
        bus.emit("history:changed", json!({"count": 0}));
    }
}
