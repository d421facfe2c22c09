//! Editing facade
//!
//! `DiagramEditor` pairs every diagram mutation with the history event that
//! records it. Edits that change nothing are not committed.

use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::diagram::Diagram;
use crate::error::{FlowError, Result};
use crate::events::EventSink;
use crate::history::{BatchEvent, DiagramChange, Direction, History, HistoryEvent, LogEntry, NodeOptionEvent};
use crate::registry::NodeRegistry;
use crate::save::{DiagramSave, EdgeSave};
use crate::types::{EdgeId, NodeId, Point, PortAddress, PortSide};

/// A diagram together with its edit history
pub struct DiagramEditor {
    diagram: Diagram,
    history: History,
}

impl DiagramEditor {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        Self {
            history: History::new(&config),
            diagram: Diagram::new(registry).with_config(config),
        }
    }

    /// Send diagram and history events to `sink`
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        Self {
            diagram: self.diagram.with_event_sink(sink.clone()),
            history: self.history.with_event_sink(sink),
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Session log recorded so far
    pub fn log(&self) -> &[LogEntry] {
        self.history.log()
    }

    pub fn create_node(&mut self, node_type: &str) -> Result<NodeId> {
        self.create_node_at(node_type, Point::default())
    }

    pub fn create_node_at(&mut self, node_type: &str, position: Point) -> Result<NodeId> {
        let id = self.diagram.create_node_at(node_type, position)?;
        let save = self.diagram.serialize_node(&id)?;
        self.history.commit(DiagramChange::CreateNode(save).into());
        Ok(id)
    }

    /// Remove a node; its incident edges are removed first in the same
    /// history entry
    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        let (save, edges) = self.diagram.remove_node(id)?;
        let mut events: Vec<HistoryEvent> = edges
            .into_iter()
            .map(|edge| DiagramChange::RemoveEdge(edge).into())
            .collect();
        events.push(DiagramChange::RemoveNode(save).into());
        self.history
            .commit(BatchEvent::new("remove-node", "remove node", events).into());
        Ok(())
    }

    /// Remove several nodes as one history entry
    ///
    /// Every id is checked before anything is removed.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Result<usize> {
        let mut unique: Vec<&NodeId> = Vec::new();
        for id in ids {
            if self.diagram.node_state(id).is_none() {
                return Err(FlowError::UnknownNode(id.clone()));
            }
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Ok(0);
        }

        let mut events: Vec<HistoryEvent> = Vec::new();
        for id in &unique {
            let (save, edges) = self.diagram.remove_node(id)?;
            events.extend(edges.into_iter().map(|edge| HistoryEvent::from(DiagramChange::RemoveEdge(edge))));
            events.push(DiagramChange::RemoveNode(save).into());
        }
        self.history
            .commit(BatchEvent::new("remove-nodes", "remove nodes", events).into());
        Ok(unique.len())
    }

    /// Split an edge with a new node of `node_type`
    ///
    /// The node is placed halfway between the edge's endpoints and connected
    /// to both of them. Everything is one history entry; if either new edge
    /// is refused the diagram is put back as it was.
    pub fn insert_node_on_edge(&mut self, node_type: &str, edge: &str) -> Result<NodeId> {
        let (source, target) = self
            .diagram
            .edge(edge)
            .map(|e| (e.source.clone(), e.target.clone()))
            .ok_or_else(|| FlowError::UnknownEdge(edge.to_string()))?;
        if !self.diagram.registry().has_node_type(node_type) {
            return Err(FlowError::UnknownNodeType(node_type.to_string()));
        }
        let position = match (
            self.diagram.node_state(&source.node),
            self.diagram.node_state(&target.node),
        ) {
            (Some(a), Some(b)) => Point::new((a.position.x + b.position.x) / 2.0, (a.position.y + b.position.y) / 2.0),
            _ => Point::default(),
        };

        let mut events: Vec<HistoryEvent> = Vec::new();
        match self.splice_edge(node_type, edge, [&source, &target], position, &mut events) {
            Ok(id) => {
                self.history.commit(
                    BatchEvent::new("insert-node-on-edge", "insert node on edge", events).into(),
                );
                Ok(id)
            }
            Err(e) => {
                let partial: HistoryEvent = BatchEvent::new("insert-node-on-edge", "insert node on edge", events).into();
                if let Err(rollback) = partial.apply(&mut self.diagram, Direction::Backward) {
                    log::error!("failed to restore edge {} after refused insert: {}", edge, rollback);
                }
                Err(e)
            }
        }
    }

    fn splice_edge(
        &mut self,
        node_type: &str,
        edge: &str,
        ends: [&PortAddress; 2],
        position: Point,
        events: &mut Vec<HistoryEvent>,
    ) -> Result<NodeId> {
        let removed = self.diagram.remove_edge(edge)?;
        events.push(DiagramChange::RemoveEdge(removed).into());

        let id = self.diagram.create_node_at(node_type, position)?;
        let save = self.diagram.serialize_node(&id)?;
        events.push(DiagramChange::CreateNode(save).into());

        for end in ends {
            let port = self.diagram.find_connectable_port(&id, end).ok_or_else(|| {
                FlowError::invalid_state(format!("{} has no port that connects to {}", node_type, end))
            })?;
            let (from, to) = match end.side {
                PortSide::Output => (end.clone(), port),
                PortSide::Input => (port, end.clone()),
            };
            let edge_id = self.diagram.connect(&from, &to)?;
            let save = self
                .diagram
                .edge(&edge_id)
                .map(EdgeSave::from)
                .ok_or_else(|| FlowError::UnknownEdge(edge_id.clone()))?;
            events.push(DiagramChange::CreateEdge(save).into());
        }
        Ok(id)
    }

    pub fn connect(&mut self, source: &PortAddress, target: &PortAddress) -> Result<EdgeId> {
        let id = self.diagram.connect(source, target)?;
        let save = self
            .diagram
            .edge(&id)
            .map(EdgeSave::from)
            .ok_or_else(|| FlowError::UnknownEdge(id.clone()))?;
        self.history.commit(DiagramChange::CreateEdge(save).into());
        Ok(id)
    }

    pub fn disconnect(&mut self, source: &PortAddress, target: &PortAddress) -> Result<()> {
        let save = self.diagram.disconnect(source, target)?;
        self.history.commit(DiagramChange::RemoveEdge(save).into());
        Ok(())
    }

    /// Remove every edge at a port as one history entry
    pub fn disconnect_port(&mut self, address: &PortAddress) -> Result<usize> {
        let removed = self.diagram.disconnect_port(address)?;
        let count = removed.len();
        if count > 0 {
            let events = removed
                .into_iter()
                .map(|edge| DiagramChange::RemoveEdge(edge).into())
                .collect();
            self.history
                .commit(BatchEvent::new("disconnect-port", "disconnect port", events).into());
        }
        Ok(count)
    }

    pub fn move_node(&mut self, id: &str, to: Point) -> Result<()> {
        let from = self.diagram.move_node(id, to)?;
        if from != to {
            self.history.commit(
                DiagramChange::MoveNode {
                    node: id.to_string(),
                    from,
                    to,
                }
                .into(),
            );
        }
        Ok(())
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.diagram.pan(dx, dy);
        self.history.commit(DiagramChange::Pan { dx, dy }.into());
    }

    /// Rename a node; returns false when the label is unchanged
    pub fn set_node_label(&mut self, id: &str, label: &str) -> Result<bool> {
        let from = self.diagram.set_node_label(id, label)?;
        if from == label {
            return Ok(false);
        }
        self.history.commit(
            DiagramChange::SetLabel {
                node: id.to_string(),
                from,
                to: label.to_string(),
            }
            .into(),
        );
        Ok(true)
    }

    /// Call a node option setter and record the change
    ///
    /// Returns false when the option already had this value; nothing is
    /// committed in that case.
    pub fn set_node_option(&mut self, node: &str, option: &str, value: Value) -> Result<bool> {
        let prev_value = self.diagram.option_value(node, option)?;
        if prev_value == value {
            return Ok(false);
        }
        self.diagram.set_node_option(node, option, value)?;
        // Record the value as the node serializes it
        let value = self.diagram.option_value(node, option)?;
        if value == prev_value {
            return Ok(false);
        }
        self.history
            .commit(NodeOptionEvent::new(node, option, value, prev_value).into());
        Ok(true)
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.history.undo(&mut self.diagram)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.history.redo(&mut self.diagram)
    }

    pub fn undo_events(&mut self, k: usize) -> Result<usize> {
        self.history.undo_events(&mut self.diagram, k)
    }

    pub fn redo_events(&mut self, k: usize) -> Result<usize> {
        self.history.redo_events(&mut self.diagram, k)
    }

    /// Replace the diagram with a saved one and clear the undo and redo
    /// stacks
    pub fn load(&mut self, save: &DiagramSave) -> Result<()> {
        self.diagram.deserialize_diagram(save)?;
        self.history.clear();
        Ok(())
    }

    pub fn save(&self) -> DiagramSave {
        self.diagram.serialize_diagram()
    }
}
