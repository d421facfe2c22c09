//! Set nodes
//!
//! Nodes that combine subsets of the same dataset.

mod difference;
mod intersection;
mod union;

pub use difference::SetDifference;
pub use intersection::SetIntersection;
pub use union::SetUnion;

use std::sync::Arc;

use flow_engine::{NodeContext, Result, SubsetPackage, TabularDataset};

/// Cover text shown when inputs carry different datasets
pub const DATASETS_MISMATCH: &str = "Datasets Mismatch";

/// Subsets arriving at `port` that carry a dataset
///
/// Returns `None` after clearing the outputs when they do not all carry
/// `dataset`.
fn operands<'a>(ctx: &mut NodeContext<'a>, port: &str, dataset: &TabularDataset) -> Option<Vec<&'a SubsetPackage>> {
    let packages: Vec<&'a SubsetPackage> = ctx
        .subset_inputs(port)
        .into_iter()
        .filter(|pkg| pkg.has_dataset())
        .collect();
    if packages.iter().any(|pkg| pkg.dataset_hash() != Some(dataset.hash())) {
        log::debug!("{}: inputs carry different datasets", ctx.node_id());
        ctx.set_cover_text(Some(DATASETS_MISMATCH));
        ctx.clear_outputs();
        return None;
    }
    Some(packages)
}

/// Union of the items of `packages`; visuals of later packages win
fn union_of(dataset: Arc<TabularDataset>, packages: &[&SubsetPackage]) -> Result<SubsetPackage> {
    let mut union = SubsetPackage::empty_of(dataset);
    for pkg in packages {
        for item in pkg.items() {
            union.add_item(item.clone())?;
        }
    }
    Ok(union)
}

#[cfg(test)]
mod tests {
    use crate::filter::RangeFilter;
    use crate::source::DataSource;
    use crate::tests::{five_rows, registry, source_with};
    use flow_engine::{Diagram, NodeId, PortAddress};
    use serde_json::json;

    /// Source plus one range filter per `(min, max)`, all connected
    pub(crate) fn ranges(diagram: &mut Diagram, bounds: &[(f64, f64)]) -> Vec<NodeId> {
        let source = source_with(diagram, five_rows());
        bounds
            .iter()
            .map(|(min, max)| {
                let filter = diagram.create_node(RangeFilter::NODE_TYPE).unwrap();
                diagram.set_node_option(&filter, "column", json!({"column": 0})).unwrap();
                diagram.set_node_option(&filter, "min", json!(min)).unwrap();
                diagram.set_node_option(&filter, "max", json!(max)).unwrap();
                diagram
                    .connect(
                        &PortAddress::output(&source, DataSource::PORT_OUT),
                        &PortAddress::input(&filter, RangeFilter::PORT_IN),
                    )
                    .unwrap();
                filter
            })
            .collect()
    }

    pub(crate) fn new_diagram() -> Diagram {
        Diagram::new(registry())
    }
}
