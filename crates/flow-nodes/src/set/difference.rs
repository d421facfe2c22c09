//! Set Difference

use std::collections::HashSet;

use flow_engine::{
    check_dataset, DatasetCapability, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor, NodeKind,
    PortDataType, PortMetadata, Result,
};
use serde_json::{Map, Value};

use super::{operands, union_of};

/// Set Difference
///
/// Items of the `in` subsets that are in none of the `inx` subsets.
///
/// # Inputs
/// - `in` (multiple) - subsets to keep items from
/// - `inx` (multiple) - subsets whose items are removed
///
/// # Outputs
/// - `out` (multiple) - the difference
pub struct SetDifference {
    capability: DatasetCapability,
}

impl SetDifference {
    pub const NODE_TYPE: &'static str = "set-difference";
    /// Port ID for the kept subsets
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the removed subsets
    pub const PORT_INX: &'static str = "inx";
    /// Port ID for the result
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN, Self::PORT_INX]),
        }
    }
}

impl Default for SetDifference {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for SetDifference {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Set, "Difference")
            .with_description("Items of the first inputs that are not in the second inputs")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset).multiple())
            .with_input(PortMetadata::optional(Self::PORT_INX, "Except", PortDataType::Subset).multiple())
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: SetDifference::descriptor,
    create: || Box::new(SetDifference::new()),
});

impl Node for SetDifference {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(kept) = operands(ctx, Self::PORT_IN, &dataset) else {
            return Ok(());
        };
        let Some(removed) = operands(ctx, Self::PORT_INX, &dataset) else {
            return Ok(());
        };

        let excluded: HashSet<usize> = removed.iter().flat_map(|pkg| pkg.item_indices()).collect();
        let mut difference = union_of(dataset, &kept)?;
        difference.filter_items(|item| !excluded.contains(&item.index));
        ctx.update_output(Self::PORT_OUT, difference);
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
