//! Ports and edges
//!
//! A port holds the ids of its incident edges in connection order. Output
//! ports own the current package; input ports read through their edges (see
//! `NodeContext`).

use serde::{Deserialize, Serialize};

use crate::descriptor::PortMetadata;
use crate::package::Package;
use crate::types::{EdgeId, NodeId, PortAddress, PortDataType, PortId, PortSide};

/// Outcome of a type check between two ports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatch {
    pub matched: bool,
    pub reason: Option<String>,
}

impl TypeMatch {
    pub fn matched() -> Self {
        Self {
            matched: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            reason: Some(reason.into()),
        }
    }
}

/// A typed attachment point on a node
#[derive(Debug, Clone)]
pub struct Port {
    pub id: PortId,
    pub node: NodeId,
    pub side: PortSide,
    pub data_type: PortDataType,
    pub multiple: bool,
    edges: Vec<EdgeId>,
    package: Option<Package>,
    is_updated: bool,
    is_connection_changed: bool,
}

impl Port {
    pub fn new(node: impl Into<String>, side: PortSide, metadata: &PortMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            node: node.into(),
            side,
            data_type: metadata.data_type,
            multiple: metadata.multiple,
            edges: Vec::new(),
            package: None,
            is_updated: false,
            is_connection_changed: false,
        }
    }

    pub fn address(&self) -> PortAddress {
        PortAddress {
            node: self.node.clone(),
            port: self.id.clone(),
            side: self.side,
        }
    }

    pub fn is_input(&self) -> bool {
        self.side == PortSide::Input
    }

    /// Incident edges in connection order
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn is_connected(&self) -> bool {
        !self.edges.is_empty()
    }

    pub fn max_connections(&self) -> usize {
        if self.multiple {
            usize::MAX
        } else {
            1
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.edges.len() < self.max_connections()
    }

    /// Compare data types, then package compatibility of both sides
    pub fn is_type_matched(&self, other: &Port, own: &[&Package], theirs: &[&Package]) -> TypeMatch {
        if !self.data_type.is_compatible_with(&other.data_type) {
            return TypeMatch::rejected(format!(
                "port types do not match: {} vs {}",
                self.data_type, other.data_type
            ));
        }
        for a in own {
            for b in theirs {
                if let Err(reason) = a.is_compatible_with(b) {
                    return TypeMatch::rejected(reason);
                }
            }
        }
        TypeMatch::matched()
    }

    pub(crate) fn add_edge(&mut self, edge: EdgeId) {
        self.edges.push(edge);
        self.is_connection_changed = true;
    }

    pub(crate) fn remove_edge(&mut self, edge: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != edge);
        let removed = self.edges.len() != before;
        if removed {
            self.is_connection_changed = true;
        }
        removed
    }

    /// Package owned by an output port
    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn has_package(&self) -> bool {
        self.package.is_some()
    }

    /// Replace the package and mark the port updated
    pub fn update_package(&mut self, package: Package) {
        self.package = Some(package);
        self.is_updated = true;
    }

    /// Drop the package; the port counts as updated only if it held one
    pub fn clear_package(&mut self) {
        if self.package.take().is_some() {
            self.is_updated = true;
        }
    }

    /// Output-side dirty flag
    pub fn is_package_updated(&self) -> bool {
        self.is_updated
    }

    pub fn is_connection_updated(&self) -> bool {
        self.is_connection_changed
    }

    pub fn clear_package_update(&mut self) {
        self.is_updated = false;
    }

    /// Reset the connection flag; returns whether it was set so the owner
    /// can react.
    pub fn clear_connection_update(&mut self) -> bool {
        std::mem::replace(&mut self.is_connection_changed, false)
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: PortAddress,
    pub target: PortAddress,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: PortAddress, target: PortAddress) -> Self {
        Self {
            id: id.into(),
            source,
            target,
        }
    }

    pub fn connects(&self, source: &PortAddress, target: &PortAddress) -> bool {
        &self.source == source && &self.target == target
    }

    pub fn is_incident_to(&self, address: &PortAddress) -> bool {
        &self.source == address || &self.target == address
    }
}
