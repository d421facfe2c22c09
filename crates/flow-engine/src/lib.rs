//! Flow Engine - dataflow diagrams with push propagation and edit history
//!
//! This crate holds the core of a visual dataflow editor:
//!
//! - Datasets shared by reference and packages (subsets, constants, JSON)
//!   flowing between typed ports
//! - A diagram manager that creates nodes through a registry, checks
//!   connections and propagates changes downstream, pruning branches whose
//!   inputs did not change
//! - Event-sourced history: undo/redo of option and structural edits, an
//!   append-only session log and replay with compressed checkpoints
//!
//! # Architecture
//!
//! - `Diagram`: nodes, edges, propagation, save/load
//! - `Node`: the contract every node kind implements, with `NodeContext`
//!   as its view of the diagram during `update`
//! - `DatasetCapability`: opt-in dataset tracking for subset consumers
//! - `History` / `Replayer`: undo/redo and log replay
//! - `DiagramEditor`: pairs each edit with its history event
//! - `EventSink`: engine event streaming
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flow_engine::{DiagramEditor, EngineConfig, NodeRegistry, PortAddress};
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut editor = DiagramEditor::new(registry, EngineConfig::default());
//! let source = editor.create_node("data-source")?;
//! let filter = editor.create_node("range-filter")?;
//! editor.connect(&PortAddress::output(&source, "out"), &PortAddress::input(&filter, "in"))?;
//! editor.undo()?;
//! ```

pub mod capability;
pub mod config;
pub mod dataset;
pub mod descriptor;
pub mod diagram;
pub mod editor;
pub mod error;
pub mod events;
pub mod history;
pub mod node;
pub mod package;
pub mod port;
mod propagate;
pub mod registry;
pub mod save;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use capability::{check_dataset, DatasetCapability, DatasetStatus};
pub use config::{EngineConfig, PropagationMode};
pub use dataset::{CellValue, ColumnRef, TabularColumn, TabularDataset, TabularRow, ValueType};
pub use descriptor::{NodeDescriptor, NodeKind, PortMetadata};
pub use diagram::Diagram;
pub use editor::DiagramEditor;
pub use error::{FlowError, Result};
pub use events::{EngineEvent, EventSink, NullEventSink, VecEventSink};
pub use history::{History, HistoryEvent, LogEntry, Replayer};
pub use node::{option_from_value, Node, NodeContext, NodeState, NO_DATASET};
pub use package::{ConstantType, ConstantsPackage, Package, SubsetItem, SubsetPackage, VisualProperties};
pub use port::{Edge, Port};
pub use registry::{NodeRegistry, NodeTypeFn};
pub use save::{DiagramSave, EdgeSave, NodeSave};
pub use store::LogStore;
pub use types::{EdgeId, NodeCategory, NodeId, Point, PortAddress, PortDataType, PortId, PortSide};
