//! Constants Generator
//!
//! Parses user-entered text into a list of constants.

use flow_engine::{
    option_from_value, ConstantsPackage, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor, NodeKind,
    PortDataType, PortMetadata, Result,
};
use serde_json::{json, Map, Value};

/// Constants Generator
///
/// The text is split on `,` and `;`; duplicates are dropped keeping the
/// first occurrence.
///
/// # Options
/// - `text` - constants as entered by the user
/// - `sorted` - sort numbers before strings
///
/// # Outputs
/// - `out` (multiple) - constants package
pub struct ConstantsGenerator {
    text: String,
    sorted: bool,
}

impl ConstantsGenerator {
    pub const NODE_TYPE: &'static str = "constants-generator";
    /// Port ID for the constants output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            text: String::new(),
            sorted: false,
        }
    }

    fn constants(&self) -> ConstantsPackage {
        let mut constants = ConstantsPackage::parse(&self.text);
        constants.unique();
        if self.sorted {
            constants.sort();
        }
        constants
    }
}

impl Default for ConstantsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for ConstantsGenerator {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Value, "Constants Generator")
            .with_description("Outputs constants parsed from text")
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Constants", PortDataType::Constants).multiple())
            .propagation_source()
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: ConstantsGenerator::descriptor,
    create: || Box::new(ConstantsGenerator::new()),
});

impl Node for ConstantsGenerator {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let constants = self.constants();
        log::debug!("ConstantsGenerator {}: {} constants", ctx.node_id(), constants.count());
        ctx.update_output(Self::PORT_OUT, constants);
        Ok(())
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("text".to_string(), json!(self.text));
        map.insert("sorted".to_string(), json!(self.sorted));
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "text" => self.text = option_from_value(option, value)?,
            "sorted" => self.sorted = option_from_value(option, value)?,
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}
