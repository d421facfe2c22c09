//! Set Union

use flow_engine::{
    check_dataset, DatasetCapability, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor, NodeKind,
    PortDataType, PortMetadata, Result,
};
use serde_json::{Map, Value};

use super::{operands, union_of};

/// Set Union
///
/// Items present in any input. When an item arrives from several inputs
/// its visuals are merged, later connections taking priority.
///
/// # Inputs
/// - `in` (multiple) - subsets of one dataset
///
/// # Outputs
/// - `out` (multiple) - the union
pub struct SetUnion {
    capability: DatasetCapability,
}

impl SetUnion {
    pub const NODE_TYPE: &'static str = "set-union";
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

impl Default for SetUnion {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for SetUnion {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Set, "Union")
            .with_description("Items present in any input")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset).multiple())
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: SetUnion::descriptor,
    create: || Box::new(SetUnion::new()),
});

impl Node for SetUnion {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let Some(dataset) = check_dataset(self, ctx) else {
            return Ok(());
        };
        let Some(packages) = operands(ctx, Self::PORT_IN, &dataset) else {
            return Ok(());
        };
        let union = union_of(dataset, &packages)?;
        ctx.update_output(Self::PORT_OUT, union);
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
