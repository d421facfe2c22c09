//! Diagram validation
//!
//! Checks a single prospective edge against the live diagram, and a saved
//! diagram as a whole before it is loaded.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::FlowError;
use crate::node::NodeState;
use crate::package::Package;
use crate::port::{Edge, Port};
use crate::registry::NodeRegistry;
use crate::save::DiagramSave;
use crate::types::{PortAddress, PortSide};

/// Why an edge cannot be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The same source and target are already connected
    EdgeExists,
    /// One of the ports is at its connection limit
    NoCapacity(String),
    /// Port types or package contents do not match
    TypeMismatch(String),
    /// The edge would connect a node to itself or close a cycle
    Cycle(String),
    /// An endpoint does not exist
    UnknownPort(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdgeExists => write!(f, "edge already exists"),
            Self::NoCapacity(port) => write!(f, "port {} has no remaining capacity", port),
            Self::TypeMismatch(reason) => f.write_str(reason),
            Self::Cycle(reason) => f.write_str(reason),
            Self::UnknownPort(port) => write!(f, "unknown port {}", port),
        }
    }
}

impl From<Rejection> for FlowError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::TypeMismatch(reason) => FlowError::TypeMismatch { reason },
            other => FlowError::Connection(other.to_string()),
        }
    }
}

/// Result of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connectivity {
    pub connectable: bool,
    pub reason: Option<Rejection>,
}

impl Connectivity {
    fn ok() -> Self {
        Self {
            connectable: true,
            reason: None,
        }
    }

    fn rejected(reason: Rejection) -> Self {
        Self {
            connectable: false,
            reason: Some(reason),
        }
    }

    pub fn into_result(self) -> Result<(), FlowError> {
        match self.reason {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }
}

fn find_port<'a>(nodes: &'a [NodeState], address: &PortAddress) -> Option<&'a Port> {
    nodes
        .iter()
        .find(|n| n.id == address.node)
        .and_then(|n| n.port(&address.port, address.side))
}

/// Packages arriving at every input of `node` that has the given port's type
fn arriving_packages<'a>(nodes: &'a [NodeState], edges: &'a [Edge], target: &Port) -> Vec<&'a Package> {
    edges
        .iter()
        .filter(|e| e.target.node == target.node)
        .filter(|e| {
            find_port(nodes, &e.target)
                .map(|p| p.data_type == target.data_type)
                .unwrap_or(false)
        })
        .filter_map(|e| find_port(nodes, &e.source).and_then(Port::package))
        .collect()
}

/// Whether `to` is reachable from `from` following edges forward
fn is_reachable(edges: &[Edge], from: &str, to: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        for edge in edges.iter().filter(|e| e.source.node == node) {
            queue.push_back(&edge.target.node);
        }
    }
    false
}

/// Check whether an edge from `source` (output) to `target` (input) may be
/// created.
///
/// Checks run in order: existing edge, capacity, type match, self loop and
/// cycle.
pub fn check_edge_connectivity(
    nodes: &[NodeState],
    edges: &[Edge],
    source: &PortAddress,
    target: &PortAddress,
) -> Connectivity {
    let (Some(source_port), Some(target_port)) = (find_port(nodes, source), find_port(nodes, target)) else {
        let missing = if find_port(nodes, source).is_none() { source } else { target };
        return Connectivity::rejected(Rejection::UnknownPort(missing.to_string()));
    };
    if source.side != PortSide::Output || target.side != PortSide::Input {
        return Connectivity::rejected(Rejection::TypeMismatch(
            "edges must run from an output port to an input port".to_string(),
        ));
    }

    if edges.iter().any(|e| e.connects(source, target)) {
        return Connectivity::rejected(Rejection::EdgeExists);
    }

    for port in [source_port, target_port] {
        if !port.has_capacity() {
            return Connectivity::rejected(Rejection::NoCapacity(port.address().to_string()));
        }
    }

    let own: Vec<&Package> = source_port.package().into_iter().collect();
    let theirs = arriving_packages(nodes, edges, target_port);
    let matched = source_port.is_type_matched(target_port, &own, &theirs);
    if !matched.matched {
        return Connectivity::rejected(Rejection::TypeMismatch(
            matched.reason.unwrap_or_else(|| "port types do not match".to_string()),
        ));
    }

    if source.node == target.node {
        return Connectivity::rejected(Rejection::Cycle("cannot connect a node to itself".to_string()));
    }
    if is_reachable(edges, &target.node, &source.node) {
        return Connectivity::rejected(Rejection::Cycle("connection would create a cycle".to_string()));
    }

    Connectivity::ok()
}

/// Validation error in a saved diagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cycle detected in the graph
    CycleDetected,
    /// Two nodes share an id
    DuplicateNode { node_id: String },
    /// A node has an unknown type (not in registry)
    UnknownNodeType { node_id: String, node_type: String },
    /// An edge references a non-existent node
    UnknownNode { edge: String, node_id: String },
    /// An edge references a port its node does not have
    UnknownPort { edge: String, port: String },
    /// An edge connects ports of different data types
    IncompatiblePortTypes { edge: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in diagram"),
            Self::DuplicateNode { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
            Self::UnknownNode { edge, node_id } => {
                write!(f, "Edge {} references unknown node '{}'", edge, node_id)
            }
            Self::UnknownPort { edge, port } => {
                write!(f, "Edge {} references unknown port {}", edge, port)
            }
            Self::IncompatiblePortTypes { edge } => {
                write!(f, "Edge {} connects incompatible port types", edge)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a saved diagram against a registry
///
/// Returns all validation errors found (not just the first).
pub fn validate_diagram(save: &DiagramSave, registry: &NodeRegistry) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut node_types: HashMap<&str, &str> = HashMap::new();
    for node in &save.nodes {
        if node_types.insert(&node.id, &node.node_type).is_some() {
            errors.push(ValidationError::DuplicateNode {
                node_id: node.id.clone(),
            });
        }
        if !registry.has_node_type(&node.node_type) {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    for (i, edge) in save.edges.iter().enumerate() {
        let label = format!("#{}", i);
        let mut types = Vec::new();
        for address in [edge.source(), edge.target()] {
            let Some(node_type) = node_types.get(address.node.as_str()) else {
                errors.push(ValidationError::UnknownNode {
                    edge: label.clone(),
                    node_id: address.node.clone(),
                });
                continue;
            };
            let Some(descriptor) = registry.descriptor(node_type) else {
                continue;
            };
            let port = match address.side {
                PortSide::Input => descriptor.input(&address.port),
                PortSide::Output => descriptor.output(&address.port),
            };
            match port {
                Some(port) => types.push(port.data_type),
                None => errors.push(ValidationError::UnknownPort {
                    edge: label.clone(),
                    port: address.to_string(),
                }),
            }
        }
        if let &[a, b] = types.as_slice() {
            if !a.is_compatible_with(&b) {
                errors.push(ValidationError::IncompatiblePortTypes { edge: label });
            }
        }
    }

    detect_cycles(save, &mut errors);
    errors
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(save: &DiagramSave, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &save.nodes {
        in_degree.insert(&node.id, 0);
    }
    for edge in &save.edges {
        if let Some(deg) = in_degree.get_mut(edge.target_node_id.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for edge in &save.edges {
            if edge.source_node_id == node_id {
                if let Some(deg) = in_degree.get_mut(edge.target_node_id.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(&edge.target_node_id);
                    }
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}
