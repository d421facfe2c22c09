//! Value Filter
//!
//! Keeps the items whose value in a column matches one of a set of
//! patterns.

use flow_engine::capability::update_column_on_dataset_change;
use flow_engine::{
    check_dataset, option_from_value, ColumnRef, DatasetCapability, FlowError, Node, NodeCategory, NodeContext,
    NodeDescriptor, NodeKind, PortDataType, PortMetadata, Result, TabularDataset,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// How a cell is compared against a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The whole cell equals the pattern
    #[default]
    Exact,
    /// The cell contains the pattern
    Substring,
}

/// Value Filter
///
/// Cells and patterns are compared as text. When the `constants` input is
/// connected its values replace the `patterns` option. Without a column
/// nothing passes.
///
/// # Inputs
/// - `in` (required) - subset to filter
/// - `constants` (optional) - patterns from upstream
///
/// # Options
/// - `column` - filtered column, or null
/// - `patterns` - patterns typed by the user
/// - `mode` - `exact` or `substring`
/// - `ignoreCase` - case-insensitive comparison (default true)
///
/// # Outputs
/// - `out` (multiple) - matching items
pub struct ValueFilter {
    capability: DatasetCapability,
    column: Option<ColumnRef>,
    patterns: Vec<String>,
    mode: MatchMode,
    ignore_case: bool,
}

impl ValueFilter {
    pub const NODE_TYPE: &'static str = "value-filter";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the optional constants input
    pub const PORT_CONSTANTS: &'static str = "constants";
    /// Port ID for the filtered output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            column: None,
            patterns: Vec::new(),
            mode: MatchMode::Exact,
            ignore_case: true,
        }
    }

    fn normalize(&self, text: String) -> String {
        if self.ignore_case {
            text.to_lowercase()
        } else {
            text
        }
    }

    fn matches(&self, cell: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| match self.mode {
            MatchMode::Exact => cell == pattern,
            MatchMode::Substring => cell.contains(pattern.as_str()),
        })
    }
}

impl Default for ValueFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for ValueFilter {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Filter, "Value Filter")
            .with_description("Keeps items whose column value matches a pattern")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_input(PortMetadata::optional(Self::PORT_CONSTANTS, "Patterns", PortDataType::Constants))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: ValueFilter::descriptor,
    create: || Box::new(ValueFilter::new()),
});

impl Node for ValueFilter {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            return Ok(());
        };

        let patterns: Vec<String> = match ctx.constants_input(Self::PORT_CONSTANTS) {
            Some(constants) => constants.values().iter().map(|v| v.to_string()).collect(),
            None => self.patterns.clone(),
        };
        let patterns: Vec<String> = patterns.into_iter().map(|p| self.normalize(p)).collect();

        let mut output = input.clone();
        match self.column {
            Some(column) => output.filter_items(|item| {
                dataset
                    .cell(item.index, column)
                    .is_some_and(|cell| self.matches(&self.normalize(cell.to_string()), &patterns))
            }),
            None => output.clear_items(),
        }
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
        map.insert("patterns".to_string(), json!(self.patterns));
        map.insert("mode".to_string(), json!(self.mode));
        map.insert("ignoreCase".to_string(), json!(self.ignore_case));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "column" => self.column = option_from_value(option, value)?,
            "patterns" => self.patterns = option_from_value(option, value)?,
            "mode" => self.mode = option_from_value(option, value)?,
            "ignoreCase" => self.ignore_case = option_from_value(option, value)?,
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConstantsGenerator, DataSource};
    use crate::tests::{five_rows, items, registry, source_with};
    use flow_engine::{Diagram, NodeId, PortAddress};

    fn setup() -> (Diagram, NodeId) {
        let mut diagram = Diagram::new(registry());
        let source = source_with(&mut diagram, five_rows());
        let filter = diagram.create_node(ValueFilter::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&filter, ValueFilter::PORT_IN),
            )
            .unwrap();
        diagram.set_node_option(&filter, "column", json!({"column": 1})).unwrap();
        (diagram, filter)
    }

    #[test]
    fn test_exact_and_substring() {
        let (mut diagram, filter) = setup();
        diagram
            .set_node_option(&filter, "patterns", json!(["ROW1", "row3"]))
            .unwrap();
        assert_eq!(items(&diagram, &filter, ValueFilter::PORT_OUT), vec![1, 3]);

        diagram.set_node_option(&filter, "ignoreCase", json!(false)).unwrap();
        assert_eq!(items(&diagram, &filter, ValueFilter::PORT_OUT), vec![3]);

        diagram.set_node_option(&filter, "patterns", json!(["ow"])).unwrap();
        assert!(items(&diagram, &filter, ValueFilter::PORT_OUT).is_empty());
        diagram.set_node_option(&filter, "mode", json!("substring")).unwrap();
        assert_eq!(items(&diagram, &filter, ValueFilter::PORT_OUT), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_constants_input_overrides_patterns() {
        let (mut diagram, filter) = setup();
        diagram.set_node_option(&filter, "patterns", json!(["row0"])).unwrap();
        diagram.set_node_option(&filter, "column", json!({"column": 0})).unwrap();

        let constants = diagram.create_node(ConstantsGenerator::NODE_TYPE).unwrap();
        diagram.set_node_option(&constants, "text", json!("2, 4")).unwrap();
        diagram
            .connect(
                &PortAddress::output(&constants, ConstantsGenerator::PORT_OUT),
                &PortAddress::input(&filter, ValueFilter::PORT_CONSTANTS),
            )
            .unwrap();
        assert_eq!(items(&diagram, &filter, ValueFilter::PORT_OUT), vec![2, 4]);
    }

    #[test]
    fn test_no_column_keeps_nothing() {
        let (mut diagram, filter) = setup();
        diagram.set_node_option(&filter, "patterns", json!(["row1"])).unwrap();
        diagram.set_node_option(&filter, "column", json!(null)).unwrap();
        assert!(items(&diagram, &filter, ValueFilter::PORT_OUT).is_empty());
        // The output still carries the dataset
        assert!(diagram.output_package(&filter, ValueFilter::PORT_OUT).is_some());
    }
}
