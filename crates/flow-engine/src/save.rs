//! Saved forms of nodes, edges and diagrams

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::port::Edge;
use crate::types::{NodeId, Point, PortAddress};

/// Serialized node: base fields supplied by the diagram plus the fragments
/// of the node's serialization chain, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSave {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub position: Point,
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

/// Serialized edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSave {
    pub source_node_id: NodeId,
    pub source_port_id: String,
    pub target_node_id: NodeId,
    pub target_port_id: String,
}

impl EdgeSave {
    pub fn source(&self) -> PortAddress {
        PortAddress::output(self.source_node_id.clone(), self.source_port_id.clone())
    }

    pub fn target(&self) -> PortAddress {
        PortAddress::input(self.target_node_id.clone(), self.target_port_id.clone())
    }
}

impl From<&Edge> for EdgeSave {
    fn from(edge: &Edge) -> Self {
        Self {
            source_node_id: edge.source.node.clone(),
            source_port_id: edge.source.port.clone(),
            target_node_id: edge.target.node.clone(),
            target_port_id: edge.target.port.clone(),
        }
    }
}

/// Serialized diagram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSave {
    pub diagram_name: String,
    pub nodes: Vec<NodeSave>,
    pub edges: Vec<EdgeSave>,
}

impl DiagramSave {
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_save_flattens_state() {
        let save: NodeSave = serde_json::from_value(json!({
            "id": "node-1",
            "type": "range-filter",
            "label": "Range Filter",
            "position": {"x": 1.0, "y": 2.0},
            "column": {"column": 0},
            "lastDatasetHash": ""
        }))
        .unwrap();

        assert_eq!(save.node_type, "range-filter");
        assert_eq!(save.state.get("lastDatasetHash"), Some(&json!("")));
        assert!(save.state.contains_key("column"));

        let back = serde_json::to_value(&save).unwrap();
        assert_eq!(back["column"], json!({"column": 0}));
        assert_eq!(back["type"], "range-filter");
    }

    #[test]
    fn test_edge_save_field_names() {
        let edge = EdgeSave {
            source_node_id: "node-1".into(),
            source_port_id: "out".into(),
            target_node_id: "node-2".into(),
            target_port_id: "in".into(),
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["sourceNodeId"], "node-1");
        assert_eq!(edge.target(), PortAddress::input("node-2", "in"));
    }
}
