//! Live Update Events
//!
//! Fire-and-forget push of named messages to whatever dashboard transport is
//! attached. No acknowledgment; publishing with no subscriber is a no-op.

use serde::Serialize;
use tokio::sync::broadcast;

/// Event names
pub mod names {
    pub const NEW_ALERT: &str = "new_alert";
    pub const NETWORK_STATS: &str = "network_stats";
    pub const TRAFFIC_UPDATE: &str = "traffic_update";
}

/// One message on the live channel
#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    pub name: &'static str,
    pub payload: serde_json::Value,
}

/// Receiver side of live updates
pub trait LiveSink: Send + Sync {
    fn publish(&self, name: &'static str, payload: serde_json::Value);
}

/// Serialize and publish, logging (not raising) serialization failures
pub fn emit<S: Serialize>(sink: Option<&dyn LiveSink>, name: &'static str, payload: &S) {
    let Some(sink) = sink else {
        return;
    };

    match serde_json::to_value(payload) {
        Ok(value) => sink.publish(name, value),
        Err(e) => log::error!("Failed to serialize '{}' payload: {}", name, e),
    }
}

// ============================================================================
// EVENT BUS
// ============================================================================

const BUS_CAPACITY: usize = 256;

/// In-process broadcast bus; the push transport subscribes here
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSink for EventBus {
    fn publish(&self, name: &'static str, payload: serde_json::Value) {
        // Err only means nobody is listening
        if self.tx.send(LiveEvent { name, payload }).is_err() {
            log::trace!("No live subscribers, '{}' dropped", name);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that keeps everything it receives
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<LiveEvent>>,
    }

    impl RecordingSink {
        pub fn count(&self, name: &str) -> usize {
            self.events.lock().iter().filter(|e| e.name == name).count()
        }

        pub fn last(&self, name: &str) -> Option<serde_json::Value> {
            self.events.lock().iter().rev().find(|e| e.name == name).map(|e| e.payload.clone())
        }
    }

    impl LiveSink for RecordingSink {
        fn publish(&self, name: &'static str, payload: serde_json::Value) {
            self.events.lock().push(LiveEvent { name, payload });
        }
    }
}
