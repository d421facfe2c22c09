//! Data Table
//!
//! Shows the rows of its input and outputs the rows the user selected.

use flow_engine::{
    check_dataset, option_from_value, DatasetCapability, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor,
    NodeKind, PortDataType, PortMetadata, Result, TabularDataset,
};
use serde_json::{json, Map, Value};

/// Data Table
///
/// # Inputs
/// - `in` (required) - subset to show
///
/// # Options
/// - `selection` - selected row indices
///
/// # Outputs
/// - `out` (multiple) - the input, forwarded
/// - `selection` (multiple) - the selected rows still present in the input
pub struct DataTable {
    capability: DatasetCapability,
    selection: Vec<usize>,
}

impl DataTable {
    pub const NODE_TYPE: &'static str = "data-table";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the forwarded input
    pub const PORT_OUT: &'static str = "out";
    /// Port ID for the selected rows
    pub const PORT_SELECTION: &'static str = "selection";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            selection: Vec::new(),
        }
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }
}

impl Default for DataTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for DataTable {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Output, "Data Table")
            .with_description("Shows rows and outputs the selected ones")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
            .with_output(PortMetadata::optional(Self::PORT_SELECTION, "Selection", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: DataTable::descriptor,
    create: || Box::new(DataTable::new()),
});

impl Node for DataTable {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if check_dataset(self, ctx).is_none() {
            return Ok(());
        }
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            return Ok(());
        };
        let selected = input.subset(&self.selection);
        log::debug!(
            "DataTable {}: {} rows, {} selected",
            ctx.node_id(),
            input.num_items(),
            selected.num_items()
        );
        ctx.update_output(Self::PORT_OUT, input.clone());
        ctx.update_output(Self::PORT_SELECTION, selected);
        Ok(())
    }

    fn on_dataset_change(&mut self, _dataset: &TabularDataset) {
        self.selection.clear();
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("selection".to_string(), json!(self.selection));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "selection" => {
                let mut selection: Vec<usize> = option_from_value(option, value)?;
                selection.sort_unstable();
                selection.dedup();
                self.selection = selection;
            }
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSource;
    use crate::tests::{five_rows, items, registry, source_with};
    use flow_engine::{Diagram, NodeId, PortAddress};

    fn table(diagram: &mut Diagram) -> (NodeId, NodeId) {
        let source = source_with(diagram, five_rows());
        let table = diagram.create_node(DataTable::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&table, DataTable::PORT_IN),
            )
            .unwrap();
        (source, table)
    }

    #[test]
    fn test_descriptor() {
        let meta = DataTable::descriptor();
        assert_eq!(meta.node_type, "data-table");
        assert_eq!(meta.category, NodeCategory::Output);
        assert_eq!(meta.outputs.len(), 2);
    }

    #[test]
    fn test_forward_and_selection() {
        let mut diagram = Diagram::new(registry());
        let (_, table) = table(&mut diagram);
        diagram.set_node_option(&table, "selection", json!([3, 1, 9])).unwrap();

        assert_eq!(items(&diagram, &table, DataTable::PORT_OUT), vec![0, 1, 2, 3, 4]);
        assert_eq!(items(&diagram, &table, DataTable::PORT_SELECTION), vec![1, 3]);
        assert_eq!(diagram.option_value(&table, "selection").unwrap(), json!([1, 3, 9]));
    }

    #[test]
    fn test_selection_cleared_on_new_dataset() {
        let mut diagram = Diagram::new(registry());
        let (source, table) = table(&mut diagram);
        diagram.set_node_option(&table, "selection", json!([2])).unwrap();

        let other = TabularDataset::from_rows(vec!["v"], vec![vec![1.0.into()], vec![2.0.into()]]);
        diagram
            .set_node_option(&source, "dataset", serde_json::to_value(other).unwrap())
            .unwrap();
        assert!(diagram.node::<DataTable>(&table).unwrap().selection().is_empty());
        assert!(items(&diagram, &table, DataTable::PORT_SELECTION).is_empty());
    }
}
