//! Value Extractor
//!
//! Turns the values of one column into constants.

use flow_engine::capability::update_column_on_dataset_change;
use flow_engine::{
    check_dataset, option_from_value, ColumnRef, ConstantsPackage, DatasetCapability, FlowError, Node, NodeCategory,
    NodeContext, NodeDescriptor, NodeKind, PortDataType, PortMetadata, Result, TabularDataset,
};
use serde_json::{json, Map, Value};

/// Value Extractor
///
/// Outputs the distinct values of a column over the input items, sorted.
///
/// # Inputs
/// - `in` (required) - subset to read
///
/// # Options
/// - `column` - extracted column, or null
///
/// # Outputs
/// - `out` (multiple) - constants
pub struct ValueExtractor {
    capability: DatasetCapability,
    column: Option<ColumnRef>,
}

impl ValueExtractor {
    pub const NODE_TYPE: &'static str = "value-extractor";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the extracted constants
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            column: None,
        }
    }
}

impl Default for ValueExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for ValueExtractor {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Value, "Value Extractor")
            .with_description("Distinct values of a column as constants")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Constants).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: ValueExtractor::descriptor,
    create: || Box::new(ValueExtractor::new()),
});

impl Node for ValueExtractor {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let (Some(input), Some(column)) = (ctx.subset_input(Self::PORT_IN), self.column) else {
            ctx.clear_output(Self::PORT_OUT);
            return Ok(());
        };
        let values = dataset.domain_values(column, &input.item_indices(), true);
        log::debug!(
            "ValueExtractor {}: {} distinct values of {}",
            ctx.node_id(),
            values.len(),
            dataset.column_name(column)
        );
        ctx.update_output(Self::PORT_OUT, ConstantsPackage::new(values));
        Ok(())
    }

    fn on_dataset_change(&mut self, dataset: &TabularDataset) {
        self.column = update_column_on_dataset_change(self.column, dataset);
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("column".to_string(), json!(self.column));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "column" => self.column = option_from_value(option, value)?,
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSource;
    use crate::tests::{registry, source_with};
    use flow_engine::{CellValue, Diagram, Package, PortAddress};

    #[test]
    fn test_distinct_sorted_values() {
        let mut diagram = Diagram::new(registry());
        let dataset = TabularDataset::from_rows(
            vec!["letter"],
            vec![vec!["b".into()], vec!["a".into()], vec!["b".into()], vec!["c".into()]],
        );
        let source = source_with(&mut diagram, dataset);
        let extractor = diagram.create_node(ValueExtractor::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&extractor, ValueExtractor::PORT_IN),
            )
            .unwrap();
        assert!(diagram.output_package(&extractor, ValueExtractor::PORT_OUT).is_none());

        diagram.set_node_option(&extractor, "column", json!({"column": 0})).unwrap();
        let values = diagram
            .output_package(&extractor, ValueExtractor::PORT_OUT)
            .and_then(Package::as_constants)
            .map(|pkg| pkg.values().to_vec());
        assert_eq!(
            values,
            Some(vec![CellValue::from("a"), CellValue::from("b"), CellValue::from("c")])
        );
    }
}
