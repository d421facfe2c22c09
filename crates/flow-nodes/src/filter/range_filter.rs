//! Range Filter
//!
//! Keeps the items whose value in a column lies within a range.

use flow_engine::capability::update_column_on_dataset_change;
use flow_engine::{
    check_dataset, option_from_value, CellValue, ColumnRef, DatasetCapability, FlowError, Node, NodeCategory, NodeContext,
    NodeDescriptor, NodeKind, PortDataType, PortMetadata, Result, TabularDataset,
};
use serde_json::{json, Map, Value};

/// Range Filter
///
/// Both bounds are inclusive and either may be absent. Cells that are not
/// numbers are filtered out. Without a column the input is forwarded.
///
/// # Inputs
/// - `in` (required) - subset to filter
///
/// # Options
/// - `column` - filtered column, or null
/// - `min`, `max` - range bounds, or null
///
/// # Outputs
/// - `out` (multiple) - items within the range
pub struct RangeFilter {
    capability: DatasetCapability,
    column: Option<ColumnRef>,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeFilter {
    pub const NODE_TYPE: &'static str = "range-filter";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the filtered output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            column: None,
            min: None,
            max: None,
        }
    }

    pub fn column(&self) -> Option<ColumnRef> {
        self.column
    }

    fn in_range(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for RangeFilter {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Filter, "Range Filter")
            .with_description("Keeps items whose column value lies within a range")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: RangeFilter::descriptor,
    create: || Box::new(RangeFilter::new()),
});

impl Node for RangeFilter {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            return Ok(());
        };
        let mut output = input.clone();
        if let Some(column) = self.column {
            output.filter_items(|item| {
                dataset
                    .cell(item.index, column)
                    .and_then(|cell| match cell {
                        CellValue::Number(n) => Some(n),
                        CellValue::Text(_) => None,
                    })
                    .is_some_and(|value| self.in_range(value))
            });
        }
        log::debug!(
            "RangeFilter {}: kept {} of {} items",
            ctx.node_id(),
            output.num_items(),
            input.num_items()
        );
        ctx.update_output(Self::PORT_OUT, output);
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
        map.insert("min".to_string(), json!(self.min));
        map.insert("max".to_string(), json!(self.max));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "column" => self.column = option_from_value(option, value)?,
            "min" => self.min = option_from_value(option, value)?,
            "max" => self.max = option_from_value(option, value)?,
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
    use flow_engine::{Diagram, PortAddress, NO_DATASET};

    fn filtered(column: Value, min: Value, max: Value) -> Vec<usize> {
        let mut diagram = Diagram::new(registry());
        let source = source_with(&mut diagram, five_rows());
        let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
        diagram.set_node_option(&filter, "column", column).unwrap();
        diagram.set_node_option(&filter, "min", min).unwrap();
        diagram.set_node_option(&filter, "max", max).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&filter, RangeFilter::PORT_IN),
            )
            .unwrap();
        items(&diagram, &filter, RangeFilter::PORT_OUT)
    }

    #[test]
    fn test_inclusive_bounds() {
        assert_eq!(filtered(json!({"column": 0}), json!(1), json!(3)), vec![1, 2, 3]);
        assert_eq!(filtered(json!({"column": 0}), json!(3), json!(null)), vec![3, 4]);
        assert_eq!(filtered(json!({"column": 0}), json!(null), json!(0)), vec![0]);
    }

    #[test]
    fn test_text_cells_are_dropped() {
        // Column 1 holds names
        assert!(filtered(json!({"column": 1}), json!(null), json!(null)).is_empty());
    }

    #[test]
    fn test_no_column_forwards() {
        assert_eq!(filtered(json!(null), json!(3), json!(null)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_index_column() {
        assert_eq!(filtered(json!("index"), json!(2), json!(2)), vec![2]);
    }

    #[test]
    fn test_unconnected_shows_no_dataset() {
        let mut diagram = Diagram::new(registry());
        let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
        assert_eq!(
            diagram.node_state(&filter).unwrap().cover_text.as_deref(),
            Some(NO_DATASET)
        );
        assert!(diagram.output_package(&filter, RangeFilter::PORT_OUT).is_none());
    }

    #[test]
    fn test_column_reset_on_new_dataset() {
        let mut diagram = Diagram::new(registry());
        let source = source_with(&mut diagram, five_rows());
        let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&filter, RangeFilter::PORT_IN),
            )
            .unwrap();
        diagram.set_node_option(&filter, "column", json!({"column": 1})).unwrap();

        let narrow = TabularDataset::from_rows(vec!["v"], vec![vec![1.0.into()]]);
        diagram
            .set_node_option(&source, "dataset", serde_json::to_value(narrow).unwrap())
            .unwrap();
        assert_eq!(diagram.node::<RangeFilter>(&filter).unwrap().column(), None);
    }
}
