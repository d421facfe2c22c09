//! Set Intersection

use std::collections::HashMap;

use flow_engine::{
    check_dataset, DatasetCapability, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor, NodeKind,
    PortDataType, PortMetadata, Result, SubsetPackage,
};
use serde_json::{Map, Value};

use super::operands;

/// Set Intersection
///
/// Items present in every input, with visuals merged in connection order.
///
/// # Inputs
/// - `in` (multiple) - subsets of one dataset
///
/// # Outputs
/// - `out` (multiple) - the intersection
pub struct SetIntersection {
    capability: DatasetCapability,
}

impl SetIntersection {
    pub const NODE_TYPE: &'static str = "set-intersection";
    /// Port ID for the subset inputs
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the result
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
        }
    }
}

impl Default for SetIntersection {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for SetIntersection {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Set, "Intersection")
            .with_description("Items present in every input")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset).multiple())
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: SetIntersection::descriptor,
    create: || Box::new(SetIntersection::new()),
});

impl Node for SetIntersection {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(packages) = operands(ctx, Self::PORT_IN, &dataset) else {
            return Ok(());
        };

        let mut occurrences: HashMap<usize, usize> = HashMap::new();
        for pkg in &packages {
            for index in pkg.item_indices() {
                *occurrences.entry(index).or_default() += 1;
            }
        }
        let mut intersection = SubsetPackage::empty_of(dataset);
        for pkg in &packages {
            for item in pkg.items() {
                if occurrences.get(&item.index) == Some(&packages.len()) {
                    intersection.add_item(item.clone())?;
                }
            }
        }
        ctx.update_output(Self::PORT_OUT, intersection);
        Ok(())
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        Map::new()
    }

    fn set_option(&mut self, option: &str, _value: Value) -> Result<()> {
        Err(FlowError::unknown_option(Self::NODE_TYPE, option))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RangeFilter;
    use crate::set::tests::{new_diagram, ranges};
    use crate::tests::items;
    use flow_engine::PortAddress;

    #[test]
    fn test_intersection() {
        let mut diagram = new_diagram();
        let filters = ranges(&mut diagram, &[(0.0, 3.0), (2.0, 4.0)]);
        let node = diagram.create_node(SetIntersection::NODE_TYPE).unwrap();
        for filter in &filters {
            diagram
                .connect(
                    &PortAddress::output(filter, RangeFilter::PORT_OUT),
                    &PortAddress::input(&node, SetIntersection::PORT_IN),
                )
                .unwrap();
        }
        assert_eq!(items(&diagram, &node, SetIntersection::PORT_OUT), vec![2, 3]);
    }
}
