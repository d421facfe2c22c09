//! Event types for observing the engine
//!
//! Events are sent from the diagram and history to any consumer (a UI
//! bridge, a test recorder) to report node updates, propagation summaries,
//! rejected connections and history changes.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Trait for receiving engine events
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A node ran its update routine
    #[serde(rename_all = "camelCase")]
    NodeUpdated { node_id: String, node_type: String },

    /// A node's update failed inside user logic
    #[serde(rename_all = "camelCase")]
    NodeFailed { node_id: String, error: String },

    /// A propagation walk finished
    #[serde(rename_all = "camelCase")]
    PropagationCompleted {
        origin: Vec<String>,
        updated: Vec<String>,
        skipped: Vec<String>,
    },

    /// A connect attempt was rejected
    #[serde(rename_all = "camelCase")]
    ConnectionRejected { reason: String },

    /// The undo or redo stack changed
    #[serde(rename_all = "camelCase")]
    HistoryChanged {
        undo_message: Option<String>,
        redo_message: Option<String>,
    },
}

impl EngineEvent {
    pub fn node_updated(node_id: &str, node_type: &str) -> Self {
        Self::NodeUpdated {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
        }
    }
}

/// Deliver an event, logging instead of failing when the sink refuses it
pub(crate) fn emit(sink: &dyn EventSink, event: EngineEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("dropped engine event: {}", e);
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for tests that count node updates.
pub struct VecEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Number of `NodeUpdated` events for a node
    pub fn update_count(&self, node_id: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, EngineEvent::NodeUpdated { node_id: id, .. } if id == node_id))
            .count()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::channel_closed())?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();
        sink.send(EngineEvent::node_updated("node-1", "range-filter")).unwrap();
        sink.send(EngineEvent::node_updated("node-2", "data-table")).unwrap();
        sink.send(EngineEvent::node_updated("node-1", "range-filter")).unwrap();

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.update_count("node-1"), 2);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(EngineEvent::ConnectionRejected {
            reason: "edge already exists".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(EngineEvent::node_updated("node-1", "sampler")).unwrap();
        assert_eq!(json["type"], "nodeUpdated");
        assert_eq!(json["nodeId"], "node-1");
    }
}
