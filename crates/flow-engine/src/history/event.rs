//! History events
//!
//! Events are plain data: a node option change records the option name and
//! both values, a structural change records the saved forms it needs to be
//! applied in either direction. Applying goes through `HistoryTarget`, whose
//! diagram implementation calls the same mutation methods live edits use.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::save::{EdgeSave, NodeSave};
use crate::types::{NodeId, Point};

/// Direction in which an event is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Redo, or the first application during replay
    Forward,
    /// Undo
    Backward,
}

/// Something history events can be applied to
pub trait HistoryTarget {
    /// Call a node's option setter with a recorded value
    fn apply_node_option(&mut self, node: &str, option: &str, value: Value) -> Result<()>;

    /// Apply a structural change or its inverse
    fn apply_diagram_change(&mut self, change: &DiagramChange, direction: Direction) -> Result<()>;
}

/// A committed history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum HistoryEvent {
    Node(NodeOptionEvent),
    Diagram(DiagramEvent),
    Batch(BatchEvent),
}

impl HistoryEvent {
    pub fn message(&self) -> &str {
        match self {
            HistoryEvent::Node(e) => &e.message,
            HistoryEvent::Diagram(e) => &e.message,
            HistoryEvent::Batch(e) => &e.message,
        }
    }

    /// Apply the event; batches run their children in reverse when going
    /// backward
    pub fn apply(&self, target: &mut dyn HistoryTarget, direction: Direction) -> Result<()> {
        match self {
            HistoryEvent::Node(e) => {
                let value = match direction {
                    Direction::Forward => e.value.clone(),
                    Direction::Backward => e.prev_value.clone(),
                };
                target.apply_node_option(&e.node, &e.option, value)
            }
            HistoryEvent::Diagram(e) => target.apply_diagram_change(&e.change, direction),
            HistoryEvent::Batch(e) => match direction {
                Direction::Forward => e.events.iter().try_for_each(|child| child.apply(target, direction)),
                Direction::Backward => e
                    .events
                    .iter()
                    .rev()
                    .try_for_each(|child| child.apply(target, direction)),
            },
        }
    }

    /// Whether `self` directly undoes `previous`: a toggle of the same option
    /// on the same node with swapped values
    pub fn cancels(&self, previous: &HistoryEvent) -> bool {
        let (HistoryEvent::Node(a), HistoryEvent::Node(b)) = (self, previous) else {
            return false;
        };
        a.is_toggle()
            && a.event_type == b.event_type
            && a.node == b.node
            && a.value == b.prev_value
            && a.prev_value == b.value
    }
}

/// A node option change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOptionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub node: NodeId,
    pub option: String,
    pub value: Value,
    pub prev_value: Value,
}

impl NodeOptionEvent {
    /// Event named `toggle-<option>` for boolean values, `set-<option>`
    /// otherwise
    pub fn new(node: impl Into<String>, option: impl Into<String>, value: Value, prev_value: Value) -> Self {
        let option = option.into();
        let verb = if value.is_boolean() && prev_value.is_boolean() {
            "toggle"
        } else {
            "set"
        };
        Self {
            event_type: format!("{}-{}", verb, option),
            message: format!("{} {}", verb, option),
            node: node.into(),
            option,
            value,
            prev_value,
        }
    }

    pub fn is_toggle(&self) -> bool {
        self.event_type.starts_with("toggle-")
    }
}

/// A structural change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEvent {
    pub message: String,
    pub change: DiagramChange,
}

impl DiagramEvent {
    pub fn new(change: DiagramChange) -> Self {
        Self {
            message: change.message().to_string(),
            change,
        }
    }
}

/// Structural changes; edges are addressed by their endpoints since edge
/// ids are not stable across undo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum DiagramChange {
    CreateNode(NodeSave),
    RemoveNode(NodeSave),
    CreateEdge(EdgeSave),
    RemoveEdge(EdgeSave),
    Pan { dx: f64, dy: f64 },
    MoveNode { node: NodeId, from: Point, to: Point },
    SetLabel { node: NodeId, from: String, to: String },
}

impl DiagramChange {
    pub fn message(&self) -> &'static str {
        match self {
            DiagramChange::CreateNode(_) => "create node",
            DiagramChange::RemoveNode(_) => "remove node",
            DiagramChange::CreateEdge(_) => "create edge",
            DiagramChange::RemoveEdge(_) => "remove edge",
            DiagramChange::Pan { .. } => "pan diagram",
            DiagramChange::MoveNode { .. } => "move node",
            DiagramChange::SetLabel { .. } => "set label",
        }
    }
}

/// Events undone and redone as one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub events: Vec<HistoryEvent>,
}

impl BatchEvent {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>, events: Vec<HistoryEvent>) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
            events,
        }
    }
}

impl From<NodeOptionEvent> for HistoryEvent {
    fn from(event: NodeOptionEvent) -> Self {
        HistoryEvent::Node(event)
    }
}

impl From<DiagramChange> for HistoryEvent {
    fn from(change: DiagramChange) -> Self {
        HistoryEvent::Diagram(DiagramEvent::new(change))
    }
}

impl From<BatchEvent> for HistoryEvent {
    fn from(event: BatchEvent) -> Self {
        HistoryEvent::Batch(event)
    }
}
