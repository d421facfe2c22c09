//! Sampler
//!
//! Keeps the first items of every group.

use flow_engine::capability::update_column_on_dataset_change;
use flow_engine::{
    check_dataset, option_from_value, ColumnRef, DatasetCapability, FlowError, Node, NodeCategory, NodeContext,
    NodeDescriptor, NodeKind, PortDataType, PortMetadata, Result, TabularDataset,
};
use serde_json::{json, Map, Value};

const DEFAULT_COUNT: usize = 5;

/// Sampler
///
/// Items are grouped by the value of `groupBy` in first-seen order; the
/// first `count` items of each group are kept. Without `groupBy` all items
/// form one group.
///
/// # Inputs
/// - `in` (required) - subset to sample
///
/// # Options
/// - `groupBy` - grouping column, or null
/// - `count` - items kept per group
///
/// # Outputs
/// - `out` (multiple) - sampled items
pub struct Sampler {
    capability: DatasetCapability,
    group_by: Option<ColumnRef>,
    count: usize,
}

impl Sampler {
    pub const NODE_TYPE: &'static str = "sampler";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the sampled output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            group_by: None,
            count: DEFAULT_COUNT,
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for Sampler {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Filter, "Sampler")
            .with_description("Keeps the first items of every group")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: Sampler::descriptor,
    create: || Box::new(Sampler::new()),
});

impl Node for Sampler {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if check_dataset(self, ctx).is_none() {
            return Ok(());
        }
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            return Ok(());
        };
        let kept: Vec<usize> = input
            .group_items(self.group_by)
            .into_iter()
            .flat_map(|group| group.into_iter().take(self.count))
            .collect();
        ctx.update_output(Self::PORT_OUT, input.subset(&kept));
        Ok(())
    }

    fn on_dataset_change(&mut self, dataset: &TabularDataset) {
        self.group_by = update_column_on_dataset_change(self.group_by, dataset);
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("groupBy".to_string(), json!(self.group_by));
        map.insert("count".to_string(), json!(self.count));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "groupBy" => self.group_by = option_from_value(option, value)?,
            "count" => self.count = option_from_value(option, value)?,
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSource;
    use crate::tests::{items, registry, source_with};
    use flow_engine::{Diagram, PortAddress};

    #[test]
    fn test_first_items_per_group() {
        let dataset = TabularDataset::from_rows(
            vec!["kind"],
            vec![
                vec!["a".into()],
                vec!["b".into()],
                vec!["a".into()],
                vec!["a".into()],
                vec!["b".into()],
            ],
        );
        let mut diagram = Diagram::new(registry());
        let source = source_with(&mut diagram, dataset);
        let sampler = diagram.create_node(Sampler::NODE_TYPE).unwrap();
        diagram
            .connect(
                &PortAddress::output(&source, DataSource::PORT_OUT),
                &PortAddress::input(&sampler, Sampler::PORT_IN),
            )
            .unwrap();

        // One group, default count
        assert_eq!(items(&diagram, &sampler, Sampler::PORT_OUT), vec![0, 1, 2, 3, 4]);

        diagram.set_node_option(&sampler, "count", json!(1)).unwrap();
        assert_eq!(items(&diagram, &sampler, Sampler::PORT_OUT), vec![0]);

        diagram.set_node_option(&sampler, "groupBy", json!({"column": 0})).unwrap();
        assert_eq!(items(&diagram, &sampler, Sampler::PORT_OUT), vec![0, 1]);

        diagram.set_node_option(&sampler, "count", json!(2)).unwrap();
        assert_eq!(items(&diagram, &sampler, Sampler::PORT_OUT), vec![0, 1, 2, 4]);
    }
}
