//! Core types shared across the engine
//!
//! Identifiers, port data types and geometry used by nodes, edges and
//! saved diagrams.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a port within its node
pub type PortId = String;

/// The data type of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Reference to a dataset plus included rows
    Subset,
    /// List of scalar values
    Constants,
    /// Opaque JSON payload
    Json,
}

impl PortDataType {
    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &PortDataType) -> bool {
        self == other
    }
}

impl std::fmt::Display for PortDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PortDataType::Subset => "subset",
            PortDataType::Constants => "constants",
            PortDataType::Json => "json",
        };
        f.write_str(name)
    }
}

/// Which side of a node a port sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSide {
    Input,
    Output,
}

impl std::fmt::Display for PortSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSide::Input => f.write_str("input"),
            PortSide::Output => f.write_str("output"),
        }
    }
}

/// Category of a node for palette grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Nodes that introduce data into the diagram
    Source,
    /// Nodes that narrow down the included rows
    Filter,
    /// Set operators over several subsets
    Set,
    /// Nodes that present or hold data
    Output,
    /// Nodes that control how data flows
    Flow,
    /// Nodes that derive constants from data
    Value,
    /// User-programmable nodes
    Script,
}

/// A point on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by an offset
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Address of a port in a diagram
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAddress {
    pub node: NodeId,
    pub port: PortId,
    pub side: PortSide,
}

impl PortAddress {
    pub fn input(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            side: PortSide::Input,
        }
    }

    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            side: PortSide::Output,
        }
    }
}

impl std::fmt::Display for PortAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}({})", self.node, self.port, self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_type_compatibility() {
        assert!(PortDataType::Subset.is_compatible_with(&PortDataType::Subset));
        assert!(!PortDataType::Subset.is_compatible_with(&PortDataType::Constants));
        assert!(!PortDataType::Json.is_compatible_with(&PortDataType::Constants));
    }

    #[test]
    fn test_port_data_type_serialization() {
        let json = serde_json::to_string(&PortDataType::Constants).unwrap();
        assert_eq!(json, "\"constants\"");
    }

    #[test]
    fn test_point_offset() {
        let p = Point::new(1.0, 2.0).offset(3.0, -1.0);
        assert_eq!(p, Point::new(4.0, 1.0));
    }
}
