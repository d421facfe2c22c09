//! Node descriptor trait and metadata types
//!
//! Every node kind describes itself (ports, category, label, flags) through
//! the `NodeKind` trait, so the implementation is the single source of truth
//! for both behavior and metadata.

use serde::{Deserialize, Serialize};

use crate::types::{NodeCategory, PortDataType};

/// Trait for node kinds that can describe their metadata
///
/// # Example
///
/// ```ignore
/// use flow_engine::{NodeKind, NodeDescriptor, PortMetadata, NodeCategory, PortDataType};
///
/// impl NodeKind for MyFilter {
///     fn descriptor() -> NodeDescriptor {
///         NodeDescriptor::new("my-filter", NodeCategory::Filter, "My Filter")
///             .with_input(PortMetadata::required("in", "In", PortDataType::Subset))
///             .with_output(PortMetadata::optional("out", "Out", PortDataType::Subset))
///     }
/// }
/// ```
pub trait NodeKind {
    /// Get the static metadata for this node kind
    fn descriptor() -> NodeDescriptor
    where
        Self: Sized;
}

/// Complete metadata for a node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// Unique type identifier (e.g., "range-filter")
    pub node_type: String,
    /// Category for palette grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Input port definitions
    pub inputs: Vec<PortMetadata>,
    /// Output port definitions
    pub outputs: Vec<PortMetadata>,
    /// Whether the node can start a propagation with no upstream input
    pub propagation_source: bool,
    /// Whether update may change row identity, not just filter rows
    pub data_mutated: bool,
}

impl NodeDescriptor {
    pub fn new(node_type: impl Into<String>, category: NodeCategory, label: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            propagation_source: false,
            data_mutated: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: PortMetadata) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortMetadata) -> Self {
        self.outputs.push(port);
        self
    }

    /// Mark the node as a propagation source
    pub fn propagation_source(mut self) -> Self {
        self.propagation_source = true;
        self
    }

    /// Mark the node as producing new rows
    pub fn data_mutated(mut self) -> Self {
        self.data_mutated = true;
        self
    }

    pub fn input(&self, id: &str) -> Option<&PortMetadata> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&PortMetadata> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// Metadata for a port (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMetadata {
    /// Port identifier
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Data type
    pub data_type: PortDataType,
    /// Whether this input is required for the node to produce output
    pub required: bool,
    /// Whether multiple connections are allowed
    pub multiple: bool,
}

impl PortMetadata {
    /// Create a new port metadata
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        data_type: PortDataType,
        required: bool,
        multiple: bool,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_type,
            required,
            multiple,
        }
    }

    /// Create a required port
    pub fn required(id: impl Into<String>, label: impl Into<String>, data_type: PortDataType) -> Self {
        Self::new(id, label, data_type, true, false)
    }

    /// Create an optional port
    pub fn optional(id: impl Into<String>, label: impl Into<String>, data_type: PortDataType) -> Self {
        Self::new(id, label, data_type, false, false)
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_metadata_required() {
        let port = PortMetadata::required("in", "In", PortDataType::Subset);
        assert_eq!(port.id, "in");
        assert!(port.required);
        assert!(!port.multiple);
    }

    #[test]
    fn test_port_metadata_multiple() {
        let port = PortMetadata::optional("inx", "Exclude", PortDataType::Subset).multiple();
        assert!(port.multiple);
        assert!(!port.required);
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = NodeDescriptor::new("data-source", NodeCategory::Source, "Data Source")
            .with_output(PortMetadata::optional("out", "Out", PortDataType::Subset))
            .propagation_source();

        assert!(descriptor.propagation_source);
        assert!(!descriptor.data_mutated);
        assert!(descriptor.output("out").is_some());
        assert!(descriptor.input("out").is_none());
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = NodeDescriptor::new("value-filter", NodeCategory::Filter, "Value Filter");
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("nodeType"));
        assert!(json.contains("propagationSource"));
    }
}
