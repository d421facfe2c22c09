//! Data Reservoir
//!
//! Holds back upstream changes while frozen.

use std::sync::Arc;

use flow_engine::{
    check_dataset, option_from_value, DatasetCapability, FlowError, Node, NodeCategory, NodeContext, NodeDescriptor,
    NodeKind, PortDataType, PortMetadata, Result, SubsetItem, SubsetPackage, TabularDataset, NO_DATASET,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Saved form of the held subset
#[derive(Serialize, Deserialize)]
struct HeldSave {
    dataset: TabularDataset,
    items: Vec<SubsetItem>,
}

impl HeldSave {
    fn from_package(package: &SubsetPackage) -> Option<Self> {
        Some(Self {
            dataset: package.dataset()?.as_ref().clone(),
            items: package.items().cloned().collect(),
        })
    }

    fn into_package(self) -> Result<SubsetPackage> {
        let mut package = SubsetPackage::empty_of(Arc::new(self.dataset));
        for item in self.items {
            package.add_item(item)?;
        }
        Ok(package)
    }
}

/// Data Reservoir
///
/// While frozen, propagation stops at this node and its output keeps the
/// last forwarded subset. Setting any option runs the node again. A frozen
/// reservoir saves the subset it holds and restores it on load instead of
/// reading its input.
///
/// # Inputs
/// - `in` (required) - subset to forward
///
/// # Options
/// - `frozen` - hold the current output
/// - `held` - the held subset (`{dataset, items}`), saved while frozen
///
/// # Outputs
/// - `out` (multiple) - the held subset
pub struct DataReservoir {
    capability: DatasetCapability,
    frozen: bool,
    held: Option<SubsetPackage>,
    /// Held subset was restored and is not yet on the output
    restore_pending: bool,
}

impl DataReservoir {
    pub const NODE_TYPE: &'static str = "data-reservoir";
    /// Port ID for the subset input
    pub const PORT_IN: &'static str = "in";
    /// Port ID for the held output
    pub const PORT_OUT: &'static str = "out";

    pub fn new() -> Self {
        Self {
            capability: DatasetCapability::new(&[Self::PORT_IN]),
            frozen: false,
            held: None,
            restore_pending: false,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn held(&self) -> Option<&SubsetPackage> {
        self.held.as_ref()
    }
}

impl Default for DataReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for DataReservoir {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, NodeCategory::Flow, "Data Reservoir")
            .with_description("Forwards its input, or holds it while frozen")
            .with_input(PortMetadata::required(Self::PORT_IN, "In", PortDataType::Subset))
            .with_output(PortMetadata::optional(Self::PORT_OUT, "Out", PortDataType::Subset).multiple())
    }
}

inventory::submit!(flow_engine::NodeTypeFn {
    descriptor: DataReservoir::descriptor,
    create: || Box::new(DataReservoir::new()),
});

impl Node for DataReservoir {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if self.frozen && std::mem::take(&mut self.restore_pending) {
            match &self.held {
                Some(held) => {
                    log::debug!("DataReservoir {}: restored {} held items", ctx.node_id(), held.num_items());
                    ctx.set_cover_text(None);
                    ctx.update_output(Self::PORT_OUT, held.clone());
                }
                None => {
                    ctx.set_cover_text(Some(NO_DATASET));
                    ctx.clear_outputs();
                }
            }
            return Ok(());
        }
        self.restore_pending = false;

        if check_dataset(self, ctx).is_none() {
            self.held = None;
            return Ok(());
        }
        let Some(input) = ctx.subset_input(Self::PORT_IN) else {
            self.held = None;
            return Ok(());
        };
        log::debug!("DataReservoir {}: holding {} items", ctx.node_id(), input.num_items());
        self.held = Some(input.clone());
        ctx.update_output(Self::PORT_OUT, input.clone());
        Ok(())
    }

    fn is_update_necessary(&self, ctx: &NodeContext<'_>) -> bool {
        self.restore_pending || (!self.frozen && ctx.is_any_input_updated())
    }

    fn dataset_capability(&self) -> Option<&DatasetCapability> {
        Some(&self.capability)
    }

    fn dataset_capability_mut(&mut self) -> Option<&mut DatasetCapability> {
        Some(&mut self.capability)
    }

    fn serialize_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("frozen".to_string(), json!(self.frozen));
        let held = match self.held.as_ref().filter(|_| self.frozen).and_then(HeldSave::from_package) {
            Some(save) => serde_json::to_value(save).unwrap_or_else(|e| {
                log::error!("DataReservoir: failed to serialize held subset: {}", e);
                Value::Null
            }),
            None => Value::Null,
        };
        map.insert("held".to_string(), held);
        map
    }

    fn set_option(&mut self, option: &str, value: Value) -> Result<()> {
        match option {
            "frozen" => self.frozen = option_from_value(option, value)?,
            "held" => {
                let save: Option<HeldSave> = option_from_value(option, value)?;
                self.held = save.map(HeldSave::into_package).transpose()?;
                self.restore_pending = true;
            }
            _ => return Err(FlowError::unknown_option(Self::NODE_TYPE, option)),
        }
        Ok(())
    }
}
