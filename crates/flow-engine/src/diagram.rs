//! Diagram manager
//!
//! Owns the node and edge collections, performs structural mutations and
//! drives propagation after each of them. Every mutation here is a plain
//! state change plus a walk; recording it in history is the editor's job
//! (see `editor.rs`), and undo/redo call back into these same methods.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{EngineConfig, PropagationMode};
use crate::error::{FlowError, Result};
use crate::events::{emit, EngineEvent, EventSink, NullEventSink};
use crate::node::{Node, NodeState};
use crate::package::Package;
use crate::port::Edge;
use crate::propagate::Propagation;
use crate::registry::NodeRegistry;
use crate::save::{DiagramSave, EdgeSave, NodeSave};
use crate::types::{EdgeId, NodeId, Point, PortAddress, PortSide};
use crate::validation::{check_edge_connectivity, validate_diagram, Connectivity};

const NODE_ID_PREFIX: &str = "node-";
const EDGE_ID_PREFIX: &str = "edge-";
const DEFAULT_DIAGRAM_NAME: &str = "untitled";

/// A dataflow diagram
pub struct Diagram {
    name: String,
    pub(crate) nodes: Vec<NodeState>,
    pub(crate) behaviors: HashMap<NodeId, Box<dyn Node>>,
    pub(crate) edges: Vec<Edge>,
    node_counter: usize,
    edge_counter: usize,
    registry: Arc<NodeRegistry>,
    pub(crate) config: EngineConfig,
    pub(crate) sink: Arc<dyn EventSink>,
}

impl Diagram {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            name: DEFAULT_DIAGRAM_NAME.to_string(),
            nodes: Vec::new(),
            behaviors: HashMap::new(),
            edges: Vec::new(),
            node_counter: 0,
            edge_counter: 0,
            registry,
            config: EngineConfig::default(),
            sink: Arc::new(NullEventSink),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn require_index(&self, id: &str) -> Result<usize> {
        self.index_of(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))
    }

    pub fn node_state(&self, id: &str) -> Option<&NodeState> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Concrete node behavior, if `id` is a node of kind `T`
    pub fn node<T: Node>(&self, id: &str) -> Option<&T> {
        self.behaviors.get(id).and_then(|b| (**b).as_any().downcast_ref::<T>())
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn find_edge(&self, source: &PortAddress, target: &PortAddress) -> Option<&Edge> {
        self.edges.iter().find(|e| e.connects(source, target))
    }

    /// Package held by an output port
    pub fn output_package(&self, node: &str, port: &str) -> Option<&Package> {
        self.node_state(node)?.output(port)?.package()
    }

    /// Package seen by an input port: the first connected output holding one
    pub fn input_package(&self, node: &str, port: &str) -> Option<&Package> {
        let input = self.node_state(node)?.input(port)?;
        input
            .edges()
            .iter()
            .filter_map(|id| self.edge(id))
            .find_map(|e| self.output_package(&e.source.node, &e.source.port))
    }

    /// Direct downstream neighbours, in edge order
    pub fn downstream_nodes(&self, id: &str) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.source.node == id) {
            if !result.contains(&edge.target.node) {
                result.push(edge.target.node.clone());
            }
        }
        result
    }

    /// Direct upstream neighbours, in edge order
    pub fn upstream_nodes(&self, id: &str) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.target.node == id) {
            if !result.contains(&edge.source.node) {
                result.push(edge.source.node.clone());
            }
        }
        result
    }

    fn next_node_id(&mut self) -> NodeId {
        self.node_counter += 1;
        format!("{}{}", NODE_ID_PREFIX, self.node_counter)
    }

    fn next_edge_id(&mut self) -> EdgeId {
        self.edge_counter += 1;
        format!("{}{}", EDGE_ID_PREFIX, self.edge_counter)
    }

    /// Keep the node counter past ids restored from saves
    fn bump_node_counter(&mut self, id: &str) {
        if let Some(n) = id
            .strip_prefix(NODE_ID_PREFIX)
            .and_then(|suffix| suffix.parse::<usize>().ok())
        {
            self.node_counter = self.node_counter.max(n);
        }
    }

    fn insert_node(&mut self, save: Option<&NodeSave>, node_type: &str, id: NodeId) -> Result<()> {
        if self.index_of(&id).is_some() {
            return Err(FlowError::InvalidDiagram(format!("node {} already exists", id)));
        }
        let (descriptor, mut behavior) = self.registry.create(node_type)?;
        let mut state = NodeState::new(id.clone(), descriptor);
        if let Some(save) = save {
            state.label = save.label.clone();
            state.position = save.position;
            if let Some(capability) = behavior.dataset_capability_mut() {
                capability.deserialize(&save.state);
            }
            behavior.deserialize_options(&save.state)?;
        }
        log::debug!("created node {} ({})", id, node_type);
        self.nodes.push(state);
        self.behaviors.insert(id, behavior);
        Ok(())
    }

    /// Create a node of a registered kind with default options
    pub fn create_node(&mut self, node_type: &str) -> Result<NodeId> {
        self.create_node_at(node_type, Point::default())
    }

    pub fn create_node_at(&mut self, node_type: &str, position: Point) -> Result<NodeId> {
        if !self.registry.has_node_type(node_type) {
            return Err(FlowError::UnknownNodeType(node_type.to_string()));
        }
        let id = self.next_node_id();
        self.insert_node(None, node_type, id.clone())?;
        if let Some(index) = self.index_of(&id) {
            self.nodes[index].position = position;
        }
        self.propagate(Propagation::forced(id.clone()));
        Ok(id)
    }

    /// Recreate a node from its saved form, keeping its id
    pub fn create_node_from_save(&mut self, save: &NodeSave) -> Result<NodeId> {
        self.insert_node(Some(save), &save.node_type, save.id.clone())?;
        self.bump_node_counter(&save.id);
        self.propagate(Propagation::forced(save.id.clone()));
        Ok(save.id.clone())
    }

    /// Remove a node and its incident edges
    ///
    /// Returns the node's saved form and the saved forms of the removed
    /// edges, in removal order.
    pub fn remove_node(&mut self, id: &str) -> Result<(NodeSave, Vec<EdgeSave>)> {
        let save = self.serialize_node(id)?;
        let incident: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| e.source.node == id || e.target.node == id)
            .map(|e| e.id.clone())
            .collect();

        let mut start = Propagation::default();
        let mut removed = Vec::new();
        for edge_id in incident {
            let edge = self.detach_edge(&edge_id)?;
            if edge.target.node != id && !start.checked.contains(&edge.target.node) {
                start.checked.push(edge.target.node.clone());
            }
            if edge.source.node != id {
                start.touched.push(edge.source.node.clone());
            }
            removed.push(EdgeSave::from(&edge));
        }

        if let Some(index) = self.index_of(id) {
            self.nodes.remove(index);
        }
        self.behaviors.remove(id);
        log::debug!("removed node {}", id);
        self.propagate(start);
        Ok((save, removed))
    }

    /// Check whether an edge may be created, without creating it
    pub fn check_connectivity(&self, source: &PortAddress, target: &PortAddress) -> Connectivity {
        check_edge_connectivity(&self.nodes, &self.edges, source, target)
    }

    fn add_edge(&mut self, source: &PortAddress, target: &PortAddress) -> Result<EdgeId> {
        let connectivity = self.check_connectivity(source, target);
        if let Some(reason) = connectivity.reason {
            log::warn!("rejected connection {} -> {}: {}", source, target, reason);
            emit(
                self.sink.as_ref(),
                EngineEvent::ConnectionRejected {
                    reason: reason.to_string(),
                },
            );
            return Err(reason.into());
        }

        let id = self.next_edge_id();
        for address in [source, target] {
            let index = self.require_index(&address.node)?;
            if let Some(port) = self.nodes[index].port_mut(&address.port, address.side) {
                port.add_edge(id.clone());
            }
        }
        self.edges.push(Edge::new(id.clone(), source.clone(), target.clone()));
        log::debug!("connected {} -> {} as {}", source, target, id);
        Ok(id)
    }

    /// Connect an output port to an input port and propagate into the target
    pub fn connect(&mut self, source: &PortAddress, target: &PortAddress) -> Result<EdgeId> {
        let id = self.add_edge(source, target)?;
        self.propagate(Propagation {
            checked: vec![target.node.clone()],
            touched: vec![source.node.clone()],
            ..Default::default()
        });
        Ok(id)
    }

    fn detach_edge(&mut self, id: &str) -> Result<Edge> {
        let position = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| FlowError::UnknownEdge(id.to_string()))?;
        let edge = self.edges.remove(position);
        for address in [&edge.source, &edge.target] {
            if let Some(index) = self.index_of(&address.node) {
                if let Some(port) = self.nodes[index].port_mut(&address.port, address.side) {
                    port.remove_edge(id);
                }
            }
        }
        log::debug!("disconnected {} ({} -> {})", id, edge.source, edge.target);
        Ok(edge)
    }

    /// Remove an edge by id and propagate into its former target
    pub fn remove_edge(&mut self, id: &str) -> Result<EdgeSave> {
        let edge = self.detach_edge(id)?;
        self.propagate(Propagation {
            checked: vec![edge.target.node.clone()],
            touched: vec![edge.source.node.clone()],
            ..Default::default()
        });
        Ok(EdgeSave::from(&edge))
    }

    /// Remove the edge between two ports
    pub fn disconnect(&mut self, source: &PortAddress, target: &PortAddress) -> Result<EdgeSave> {
        let id = self
            .find_edge(source, target)
            .map(|e| e.id.clone())
            .ok_or_else(|| FlowError::UnknownEdge(format!("{} -> {}", source, target)))?;
        self.remove_edge(&id)
    }

    /// Remove every edge incident to a port, then propagate from the
    /// affected downstream nodes
    pub fn disconnect_port(&mut self, address: &PortAddress) -> Result<Vec<EdgeSave>> {
        let index = self.require_index(&address.node)?;
        let port = self.nodes[index]
            .port(&address.port, address.side)
            .ok_or_else(|| FlowError::UnknownPort {
                node: address.node.clone(),
                port: address.port.clone(),
                side: address.side.to_string(),
            })?;
        let incident: Vec<EdgeId> = port.edges().to_vec();

        let mut start = Propagation::default();
        let mut removed = Vec::new();
        for edge_id in incident {
            let edge = self.detach_edge(&edge_id)?;
            if !start.checked.contains(&edge.target.node) {
                start.checked.push(edge.target.node.clone());
            }
            start.touched.push(edge.source.node.clone());
            removed.push(EdgeSave::from(&edge));
        }
        self.propagate(start);
        Ok(removed)
    }

    /// First port on `node` that can be connected with `other`
    pub fn find_connectable_port(&self, node: &str, other: &PortAddress) -> Option<PortAddress> {
        let state = self.node_state(node)?;
        let candidates = match other.side {
            PortSide::Output => &state.inputs,
            PortSide::Input => &state.outputs,
        };
        candidates.iter().map(|p| p.address()).find(|candidate| {
            let connectivity = match other.side {
                PortSide::Output => self.check_connectivity(other, candidate),
                PortSide::Input => self.check_connectivity(candidate, other),
            };
            connectivity.connectable
        })
    }

    /// Move a node; returns its previous position
    pub fn move_node(&mut self, id: &str, to: Point) -> Result<Point> {
        let index = self.require_index(id)?;
        Ok(std::mem::replace(&mut self.nodes[index].position, to))
    }

    /// Translate every node
    pub fn pan(&mut self, dx: f64, dy: f64) {
        for node in &mut self.nodes {
            node.position = node.position.offset(dx, dy);
        }
    }

    pub fn set_node_label(&mut self, id: &str, label: impl Into<String>) -> Result<String> {
        let index = self.require_index(id)?;
        Ok(std::mem::replace(&mut self.nodes[index].label, label.into()))
    }

    /// Call a node's option setter, then update the node and propagate
    pub fn set_node_option(&mut self, node: &str, option: &str, value: Value) -> Result<()> {
        let behavior = self
            .behaviors
            .get_mut(node)
            .ok_or_else(|| FlowError::UnknownNode(node.to_string()))?;
        behavior.set_option(option, value)?;
        log::debug!("set {}.{}", node, option);
        self.propagate(Propagation::forced(node));
        Ok(())
    }

    pub fn option_value(&self, node: &str, option: &str) -> Result<Value> {
        let behavior = self
            .behaviors
            .get(node)
            .ok_or_else(|| FlowError::UnknownNode(node.to_string()))?;
        behavior.option_value(option).ok_or_else(|| {
            let node_type = self.node_state(node).map(NodeState::node_type).unwrap_or_default();
            FlowError::unknown_option(node_type, option)
        })
    }

    /// Update a node unconditionally and propagate from it
    pub fn update_node(&mut self, id: &str) -> Result<()> {
        self.require_index(id)?;
        self.propagate(Propagation::forced(id));
        Ok(())
    }

    /// Saved form of one node: base fields plus its serialization chain
    pub fn serialize_node(&self, id: &str) -> Result<NodeSave> {
        let state = self
            .node_state(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))?;
        let behavior = self
            .behaviors
            .get(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))?;

        let mut fragments: Map<String, Value> = Map::new();
        if let Some(capability) = behavior.dataset_capability() {
            fragments.extend(capability.serialize());
        }
        fragments.extend(behavior.serialize_options());

        Ok(NodeSave {
            id: state.id.clone(),
            node_type: state.node_type().to_string(),
            label: state.label.clone(),
            position: state.position,
            state: fragments,
        })
    }

    /// Saved form of the diagram; edges are listed per node output port
    pub fn serialize_diagram(&self) -> DiagramSave {
        let nodes = self
            .nodes
            .iter()
            .filter_map(|n| self.serialize_node(&n.id).ok())
            .collect();
        let edges = self
            .nodes
            .iter()
            .flat_map(|n| n.outputs.iter())
            .flat_map(|p| p.edges().iter())
            .filter_map(|id| self.edge(id))
            .map(EdgeSave::from)
            .collect();
        DiagramSave {
            diagram_name: self.name.clone(),
            nodes,
            edges,
        }
    }

    /// Replace the diagram with a saved one
    ///
    /// The save is validated first, then built into a fresh diagram: nodes,
    /// then edges, with each node's saved state restored; finally every node
    /// is updated once in dependency order. The current diagram is replaced
    /// only when every step succeeds.
    pub fn deserialize_diagram(&mut self, save: &DiagramSave) -> Result<()> {
        let errors = validate_diagram(save, &self.registry);
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FlowError::InvalidDiagram(message));
        }

        let mut loaded = Diagram::new(self.registry.clone())
            .with_config(self.config.clone())
            .with_event_sink(self.sink.clone());
        if let Err(e) = loaded.populate(save) {
            log::warn!("failed to load diagram '{}': {}", save.diagram_name, e);
            return Err(e);
        }
        *self = loaded;
        log::info!(
            "loaded diagram '{}' with {} nodes and {} edges",
            self.name,
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    /// Build a save into this empty diagram and run the initial update
    fn populate(&mut self, save: &DiagramSave) -> Result<()> {
        self.name = save.diagram_name.clone();
        for node in &save.nodes {
            self.insert_node(Some(node), &node.node_type, node.id.clone())?;
            self.bump_node_counter(&node.id);
        }
        for edge in &save.edges {
            self.add_edge(&edge.source(), &edge.target())?;
        }

        // Nodes without inputs start the walk unconditionally; the rest
        // update when their inputs carry something new.
        let mut start = Propagation::default();
        for node in &self.nodes {
            if node.is_propagation_source() || !node.inputs.iter().any(|p| p.is_connected()) {
                start.forced.push(node.id.clone());
            } else {
                start.checked.push(node.id.clone());
            }
        }
        self.propagate_with(PropagationMode::Topological, start);
        Ok(())
    }

    /// Remove every node and edge
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.behaviors.clear();
        self.edges.clear();
        self.node_counter = 0;
        self.edge_counter = 0;
        self.name = DEFAULT_DIAGRAM_NAME.to_string();
    }
}
