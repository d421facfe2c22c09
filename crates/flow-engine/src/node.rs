//! Node contract and runtime state
//!
//! A node in a diagram is split in two halves:
//!
//! - `NodeState`: the parts the diagram manager owns (ports, label,
//!   position, cover text, error message)
//! - a `Box<dyn Node>`: the kind-specific behavior and options
//!
//! During `update` a node reads its inputs and stages its outputs through a
//! `NodeContext`, which borrows the diagram's node and edge collections
//! immutably. Staged writes are applied once the update returns.

use std::any::Any;

use serde_json::{Map, Value};

use crate::capability::DatasetCapability;
use crate::dataset::TabularDataset;
use crate::descriptor::NodeDescriptor;
use crate::error::{FlowError, Result};
use crate::package::{ConstantsPackage, Package, SubsetPackage};
use crate::port::{Edge, Port};
use crate::types::{NodeId, Point, PortId, PortSide};

/// Cover text shown when a node has no usable input dataset
pub const NO_DATASET: &str = "No Dataset";

/// Upcast helper for downcasting boxed nodes to their concrete kind
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Kind-specific behavior of a node
///
/// Option setters are reached through [`Node::set_option`]. The diagram
/// manager runs the node's `update` and the propagation walk after every
/// setter call, so live edits and history replay share one code path.
pub trait Node: AsAny + Send {
    /// Recompute outputs from the current input state.
    ///
    /// Must be idempotent: running it twice with unchanged inputs yields the
    /// same outputs.
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()>;

    /// Whether the node must recompute during a propagation walk
    fn is_update_necessary(&self, ctx: &NodeContext<'_>) -> bool {
        ctx.is_any_input_updated()
    }

    /// Called after an incident edge was added or removed on `port`
    fn on_connection_change(&mut self, _port: &str, _side: PortSide) {}

    /// Called when the resolved input dataset changes content
    fn on_dataset_change(&mut self, _dataset: &TabularDataset) {}

    /// Dataset tracking for nodes that consume subsets
    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        None
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        None
    }

    /// Option values, keyed by option name
    fn serialize_options(&self) -> Map<String, Value>;

    /// Set one option from its serialized value
    fn set_option(&mut self, option: &str, value: Value) -> Result<()>;

    /// Current serialized value of an option
    fn option_value(&self, option: &str) -> Option<Value> {
        self.serialize_options().get(option).cloned()
    }

    /// Restore options from a saved fragment; missing options keep defaults
    fn deserialize_options(&mut self, save: &Map<String, Value>) -> Result<()> {
        let names: Vec<String> = self.serialize_options().keys().cloned().collect();
        for name in names {
            if let Some(value) = save.get(&name) {
                self.set_option(&name, value.clone())?;
            }
        }
        Ok(())
    }
}

/// Decode an option value into a typed field
pub fn option_from_value<T: serde::de::DeserializeOwned>(option: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| FlowError::invalid_option(option, e))
}

/// Diagram-owned state of a node
#[derive(Debug, Clone)]
pub struct NodeState {
    pub id: NodeId,
    pub descriptor: NodeDescriptor,
    pub label: String,
    pub position: Point,
    pub cover_text: Option<String>,
    pub error: Option<String>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl NodeState {
    pub fn new(id: impl Into<String>, descriptor: NodeDescriptor) -> Self {
        let id = id.into();
        let inputs = descriptor
            .inputs
            .iter()
            .map(|meta| Port::new(id.clone(), PortSide::Input, meta))
            .collect();
        let outputs = descriptor
            .outputs
            .iter()
            .map(|meta| Port::new(id.clone(), PortSide::Output, meta))
            .collect();
        Self {
            label: descriptor.label.clone(),
            id,
            descriptor,
            position: Point::default(),
            cover_text: None,
            error: None,
            inputs,
            outputs,
        }
    }

    pub fn node_type(&self) -> &str {
        &self.descriptor.node_type
    }

    pub fn is_propagation_source(&self) -> bool {
        self.descriptor.propagation_source
    }

    pub fn input(&self, id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == id)
    }

    pub fn port(&self, id: &str, side: PortSide) -> Option<&Port> {
        match side {
            PortSide::Input => self.input(id),
            PortSide::Output => self.output(id),
        }
    }

    pub(crate) fn port_mut(&mut self, id: &str, side: PortSide) -> Option<&mut Port> {
        let ports = match side {
            PortSide::Input => &mut self.inputs,
            PortSide::Output => &mut self.outputs,
        };
        ports.iter_mut().find(|p| p.id == id)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn has_updated_output(&self) -> bool {
        self.outputs.iter().any(|p| p.is_package_updated())
    }
}

/// Writes staged by a node during one update
#[derive(Debug, Default)]
pub(crate) struct NodeEffects {
    pub outputs: Vec<(PortId, Option<Package>)>,
    pub cover_text: Option<Option<String>>,
}

/// Read view of the diagram for one node plus its staged writes
pub struct NodeContext<'a> {
    node: &'a NodeState,
    nodes: &'a [NodeState],
    edges: &'a [Edge],
    effects: NodeEffects,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(node: &'a NodeState, nodes: &'a [NodeState], edges: &'a [Edge]) -> Self {
        Self {
            node,
            nodes,
            edges,
            effects: NodeEffects::default(),
        }
    }

    pub(crate) fn into_effects(self) -> NodeEffects {
        self.effects
    }

    pub fn node_id(&self) -> &str {
        &self.node.id
    }

    pub fn node(&self) -> &NodeState {
        self.node
    }

    /// Output ports feeding an input port, in connection order
    fn sources(&self, port: &str) -> Vec<&'a Port> {
        let Some(input) = self.node.input(port) else {
            return Vec::new();
        };
        input
            .edges()
            .iter()
            .filter_map(|edge_id| self.edges.iter().find(|e| &e.id == edge_id))
            .filter_map(|edge| {
                self.nodes
                    .iter()
                    .find(|n| n.id == edge.source.node)
                    .and_then(|n| n.output(&edge.source.port))
            })
            .collect()
    }

    pub fn is_connected(&self, port: &str) -> bool {
        self.node.input(port).map(Port::is_connected).unwrap_or(false)
    }

    /// Package of the first connected output that has one
    pub fn input_package(&self, port: &str) -> Option<&'a Package> {
        self.sources(port).into_iter().find_map(Port::package)
    }

    /// Packages of every connected output, in connection order
    pub fn input_packages(&self, port: &str) -> Vec<&'a Package> {
        self.sources(port).into_iter().filter_map(Port::package).collect()
    }

    pub fn subset_input(&self, port: &str) -> Option<&'a SubsetPackage> {
        self.input_package(port).and_then(Package::as_subset)
    }

    pub fn subset_inputs(&self, port: &str) -> Vec<&'a SubsetPackage> {
        self.input_packages(port)
            .into_iter()
            .filter_map(Package::as_subset)
            .collect()
    }

    pub fn constants_input(&self, port: &str) -> Option<&'a ConstantsPackage> {
        self.input_package(port).and_then(Package::as_constants)
    }

    pub fn json_input(&self, port: &str) -> Option<&'a Value> {
        self.input_package(port).and_then(Package::as_json)
    }

    /// Whether an input saw a connection change or an upstream package update
    pub fn is_input_updated(&self, port: &str) -> bool {
        let Some(input) = self.node.input(port) else {
            return false;
        };
        input.is_connection_updated() || self.sources(port).iter().any(|p| p.is_package_updated())
    }

    pub fn is_any_input_updated(&self) -> bool {
        self.node.inputs.iter().any(|p| self.is_input_updated(&p.id))
    }

    /// Current package of an output, including writes staged in this update
    pub fn output_package(&self, port: &str) -> Option<&Package> {
        if let Some((_, staged)) = self.effects.outputs.iter().rev().find(|(id, _)| id == port) {
            return staged.as_ref();
        }
        self.node.output(port).and_then(Port::package)
    }

    pub fn update_output(&mut self, port: &str, package: impl Into<Package>) {
        self.effects.outputs.push((port.to_string(), Some(package.into())));
    }

    pub fn clear_output(&mut self, port: &str) {
        self.effects.outputs.push((port.to_string(), None));
    }

    pub fn clear_outputs(&mut self) {
        for port in &self.node.outputs {
            self.effects.outputs.push((port.id.clone(), None));
        }
    }

    /// Set or remove the placeholder message
    pub fn set_cover_text(&mut self, text: Option<&str>) {
        self.effects.cover_text = Some(text.map(str::to_string));
    }
}
