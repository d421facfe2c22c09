//! Node type registry
//!
//! Maps node type strings to descriptors and factories. The diagram manager
//! creates nodes only through a registry, so saved diagrams and history
//! replay resolve node kinds the same way live edits do.
//!
//! # Usage
//!
//! ```ignore
//! use flow_engine::NodeRegistry;
//!
//! // Everything submitted with `inventory::submit!(NodeTypeFn { .. })`
//! let registry = NodeRegistry::with_builtins();
//! let node = registry.create("range-filter")?;
//! ```

use std::collections::HashMap;

use crate::descriptor::NodeDescriptor;
use crate::error::{FlowError, Result};
use crate::node::Node;
use crate::types::NodeCategory;

/// Link-time registration of a node kind.
///
/// # Example
///
/// ```ignore
/// inventory::submit!(flow_engine::NodeTypeFn {
///     descriptor: RangeFilter::descriptor,
///     create: || Box::new(RangeFilter::new()),
/// });
/// ```
pub struct NodeTypeFn {
    /// Function returning the static descriptor of the kind
    pub descriptor: fn() -> NodeDescriptor,
    /// Factory creating a node with default options
    pub create: fn() -> Box<dyn Node>,
}

inventory::collect!(NodeTypeFn);

struct RegistryEntry {
    descriptor: NodeDescriptor,
    create: fn() -> Box<dyn Node>,
}

/// Registry of node kinds
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every node kind submitted via `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<NodeTypeFn> {
            registry.register((entry.descriptor)(), entry.create);
        }
        log::debug!("registered {} built-in node types", registry.entries.len());
        registry
    }

    /// Register a node kind; a later registration replaces an earlier one
    pub fn register(&mut self, descriptor: NodeDescriptor, create: fn() -> Box<dyn Node>) {
        self.entries
            .insert(descriptor.node_type.clone(), RegistryEntry { descriptor, create });
    }

    /// Create a node with default options
    pub fn create(&self, node_type: &str) -> Result<(NodeDescriptor, Box<dyn Node>)> {
        let entry = self
            .entries
            .get(node_type)
            .ok_or_else(|| FlowError::UnknownNodeType(node_type.to_string()))?;
        Ok((entry.descriptor.clone(), (entry.create)()))
    }

    pub fn descriptor(&self, node_type: &str) -> Option<&NodeDescriptor> {
        self.entries.get(node_type).map(|e| &e.descriptor)
    }

    pub fn all_descriptors(&self) -> Vec<&NodeDescriptor> {
        self.entries.values().map(|e| &e.descriptor).collect()
    }

    /// Descriptors grouped by category
    pub fn descriptors_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeDescriptor>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeDescriptor>> = HashMap::new();
        for entry in self.entries.values() {
            grouped.entry(entry.descriptor.category).or_default().push(&entry.descriptor);
        }
        grouped
    }

    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// Registered node type strings, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Merge another registry into this one; entries of `other` win
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
