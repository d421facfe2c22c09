//! Data Source
//!
//! Emits every row of a loaded tabular dataset as a subset.

use std::sync::Arc;

use flow_engine::{
    option_from_value, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor, NodeKind, PortDataType,
    PortMetadata, Result, SubsetPackage, TabularDataset, NO_DATASET,
};
use serde_json::{Map, Value};

/// Data Source
///
/// # Options
/// - `dataset` - the loaded dataset (`{columns, rows}`), or null
///
/// # Outputs
/// - `out` (multiple) - subset with every row of the dataset
pub struct DataSource {
    dataset: Option<Arc<TabularDataset>>,
}

impl DataSource {
    pub const NODE_TYPE: &'static str = "data-source";
    /// Port ID for the subset output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self { dataset: None }
    }

    pub fn dataset(&self) -> Option<&Arc<TabularDataset>> {
        self.dataset.as_ref()
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for DataSource {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Source, "Data Source")
            .with_description("Loads a tabular dataset and outputs all of its rows")
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
            .propagation_source()
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: DataSource::descriptor,
    create: || Box::new(DataSource::new()),
});

impl Node for DataSource {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = &self.dataset else {
            ctx.set_cover_text(Some(NO_DATASET));
            ctx.clear_outputs();
            return Ok(());
        };
        log::debug!(
            "DataSource {}: {} rows x {} columns",
            ctx.node_id(),
            dataset.num_rows(),
            dataset.num_columns()
        );
        ctx.set_cover_text(None);
        ctx.update_output(Self::PORT_OUT, SubsetPackage::from_dataset(dataset.clone()));
        Ok(())
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let dataset = match self.dataset.as_deref() {
            Some(dataset) => serde_json::to_value(dataset).unwrap_or_else(|e| {
                log::error!("DataSource: failed to serialize dataset {}: {}", dataset.hash(), e);
                Value::Null
            }),
            None => Value::Null,
        };
        map.insert("dataset".to_string(), dataset);
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "dataset" => {
                let dataset: Option<TabularDataset> = option_from_value(option, value)?;
                self.dataset = dataset.map(Arc::new);
            }
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{five_rows, registry};
    use flow_engine::{Diagram, Package};
    use serde_json::json;

    #[test]
    fn test_descriptor() {
        let meta = DataSource::descriptor();
        assert_eq!(meta.node_type, "data-source");
        assert_eq!(meta.category, NodeCategory::Source);
        assert!(meta.propagation_source);
        assert!(meta.inputs.is_empty());
    }

    #[test]
    fn test_emits_all_rows() {
        let mut diagram = Diagram::new(registry());
        let id = diagram.create_node(DataSource::NODE_TYPE).unwrap();
        assert_eq!(
            diagram.node_state(&id).unwrap().cover_text.as_deref(),
            Some(NO_DATASET)
        );

        diagram
            .set_node_option(&id, "dataset", serde_json::to_value(five_rows()).unwrap())
            .unwrap();
        let items = diagram
            .output_package(&id, DataSource::PORT_OUT)
            .and_then(Package::as_subset)
            .map(SubsetPackage::item_indices);
        assert_eq!(items, Some(vec![0, 1, 2, 3, 4]));
        assert_eq!(diagram.node_state(&id).unwrap().cover_text, None);

        diagram.set_node_option(&id, "dataset", json!(null)).unwrap();
        assert!(diagram.output_package(&id, DataSource::PORT_OUT).is_none());
    }

    #[test]
    fn test_dataset_option_round_trip() {
        let mut node = DataSource::new();
        node.set_option("dataset", serde_json::to_value(five_rows()).unwrap())
            .unwrap();
        let saved = node.serialize_options();

        let mut restored = DataSource::new();
        restored.deserialize_options(&saved).unwrap();
        assert_eq!(restored.dataset().unwrap().hash(), five_rows().hash());
    }

    #[test]
    fn test_saved_source_reloads_same_rows() {
        let mut diagram = Diagram::new(registry());
        let id = diagram.create_node(DataSource::NODE_TYPE).unwrap();
        diagram
            .set_node_option(&id, "dataset", serde_json::to_value(five_rows()).unwrap())
            .unwrap();
        let saved = diagram.option_value(&id, "dataset").unwrap();
        assert!(!saved.is_null());

        let mut other = Diagram::new(registry());
        let copy = other.create_node(DataSource::NODE_TYPE).unwrap();
        other.set_node_option(&copy, "dataset", saved).unwrap();
        let node = other.node::<DataSource>(&copy).unwrap();
        assert_eq!(node.dataset().unwrap().hash(), five_rows().hash());
        assert_eq!(
            other.output_package(&copy, DataSource::PORT_OUT),
            diagram.output_package(&id, DataSource::PORT_OUT)
        );
    }
}
