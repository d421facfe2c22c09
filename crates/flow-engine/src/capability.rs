//! Dataset capability for nodes that consume subsets
//!
//! A node opts in by holding a `DatasetCapability` and returning it from
//! `Node::dataset_capability`. The capability resolves which dataset the
//! node operates on, detects content changes by hash, and contributes
//! `lastDatasetHash` to the node's saved form.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::dataset::{ColumnRef, TabularDataset};
use crate::node::{Node, NodeContext, NO_DATASET};

/// Outcome of resolving a node's input dataset
#[derive(Debug, Clone)]
pub enum DatasetStatus {
    /// No connected input carries a dataset
    Missing,
    /// Same content as the last observed dataset
    Unchanged(Arc<TabularDataset>),
    /// Content hash differs from the last observed dataset
    Changed(Arc<TabularDataset>),
}

impl DatasetStatus {
    pub fn dataset(&self) -> Option<&Arc<TabularDataset>> {
        match self {
            DatasetStatus::Missing => None,
            DatasetStatus::Unchanged(ds) | DatasetStatus::Changed(ds) => Some(ds),
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, DatasetStatus::Changed(_))
    }
}

/// Tracks the dataset a node works against
#[derive(Debug, Clone)]
pub struct DatasetCapability {
    ports: Vec<&'static str>,
    dataset: Option<Arc<TabularDataset>>,
    last_dataset_hash: String,
}

impl DatasetCapability {
    /// Track the datasets arriving on the given input ports, in priority order
    pub fn new(ports: &[&'static str]) -> Self {
        Self {
            ports: ports.to_vec(),
            dataset: None,
            last_dataset_hash: String::new(),
        }
    }

    pub fn dataset(&self) -> Option<&Arc<TabularDataset>> {
        self.dataset.as_ref()
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn last_dataset_hash(&self) -> &str {
        &self.last_dataset_hash
    }

    /// First dataset carried by any connected input
    pub fn resolve_dataset(&self, ctx: &NodeContext<'_>) -> Option<Arc<TabularDataset>> {
        self.ports
            .iter()
            .flat_map(|port| ctx.subset_inputs(port))
            .find_map(|pkg| pkg.dataset().cloned())
    }

    /// True only if no connected input carries a dataset
    pub fn has_no_dataset(&self, ctx: &NodeContext<'_>) -> bool {
        self.resolve_dataset(ctx).is_none()
    }

    /// Resolve the dataset, updating the cover text and clearing outputs
    /// when there is none.
    pub fn check_dataset(&mut self, ctx: &mut NodeContext<'_>) -> DatasetStatus {
        let Some(dataset) = self.resolve_dataset(ctx) else {
            self.dataset = None;
            ctx.set_cover_text(Some(NO_DATASET));
            ctx.clear_outputs();
            return DatasetStatus::Missing;
        };
        ctx.set_cover_text(None);
        self.dataset = Some(dataset.clone());
        if dataset.hash() != self.last_dataset_hash {
            log::debug!(
                "node {} dataset changed: '{}' -> '{}'",
                ctx.node_id(),
                self.last_dataset_hash,
                dataset.hash()
            );
            self.last_dataset_hash = dataset.hash().to_string();
            DatasetStatus::Changed(dataset)
        } else {
            DatasetStatus::Unchanged(dataset)
        }
    }

    /// Saved fragment contributed to the node's serialized form
    pub fn serialize(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "lastDatasetHash".to_string(),
            Value::String(self.last_dataset_hash.clone()),
        );
        map
    }

    pub fn deserialize(&mut self, save: &Map<String, Value>) {
        if let Some(hash) = save.get("lastDatasetHash").and_then(Value::as_str) {
            self.last_dataset_hash = hash.to_string();
        }
    }
}

/// Run a node's dataset check and fire `on_dataset_change` on a content change.
///
/// Returns the resolved dataset, or `None` when the node has no usable
/// input (its outputs are cleared and the cover text is set).
pub fn check_dataset<N: Node + ?Sized>(node: &mut N, ctx: &mut NodeContext<'_>) -> Option<Arc<TabularDataset>> {
    let status = match node.dataset_capability_mut() {
        Some(capability) => capability.check_dataset(ctx),
        None => {
            log::error!("node {} checked a dataset without a dataset capability", ctx.node_id());
            return None;
        }
    };
    match status {
        DatasetStatus::Missing => None,
        DatasetStatus::Unchanged(dataset) => Some(dataset),
        DatasetStatus::Changed(dataset) => {
            node.on_dataset_change(&dataset);
            Some(dataset)
        }
    }
}

/// Keep a column selection only if it still exists in the new dataset
pub fn update_column_on_dataset_change(column: Option<ColumnRef>, dataset: &TabularDataset) -> Option<ColumnRef> {
    column.filter(|c| dataset.has_column(*c))
}

/// Keep the column selections that still exist in the new dataset
pub fn update_columns_on_dataset_change(columns: &[ColumnRef], dataset: &TabularDataset) -> Vec<ColumnRef> {
    columns.iter().copied().filter(|c| dataset.has_column(*c)).collect()
}
