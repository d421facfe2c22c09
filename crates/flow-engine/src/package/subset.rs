//! Subset packages: a shared dataset plus included rows

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset::{ColumnRef, GroupKey, TabularDataset};
use crate::error::{FlowError, Result};

/// Per-row visual overrides. Unset fields fall back to the renderer default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl VisualProperties {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(&mut self, other: &VisualProperties) {
        if other.opacity.is_some() {
            self.opacity = other.opacity;
        }
        if other.color.is_some() {
            self.color = other.color.clone();
        }
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.border.is_some() {
            self.border = other.border.clone();
        }
        if other.width.is_some() {
            self.width = other.width;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == VisualProperties::default()
    }
}

/// An included row with its visual overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetItem {
    pub index: usize,
    #[serde(default)]
    pub visuals: VisualProperties,
}

impl SubsetItem {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            visuals: VisualProperties::default(),
        }
    }

    pub fn with_visuals(index: usize, visuals: VisualProperties) -> Self {
        Self { index, visuals }
    }
}

/// Reference to a dataset plus an included-row set
///
/// The dataset is shared; `Clone` deep-copies the items and shares the
/// dataset reference, so a cloned package can be mutated without touching
/// the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsetPackage {
    dataset: Option<Arc<TabularDataset>>,
    items: BTreeMap<usize, SubsetItem>,
}

impl SubsetPackage {
    /// Create an empty package with no dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a package over a dataset with every row included
    pub fn from_dataset(dataset: Arc<TabularDataset>) -> Self {
        let items = (0..dataset.num_rows())
            .map(|index| (index, SubsetItem::new(index)))
            .collect();
        Self {
            dataset: Some(dataset),
            items,
        }
    }

    /// Create a package over a dataset with no rows included
    pub fn empty_of(dataset: Arc<TabularDataset>) -> Self {
        Self {
            dataset: Some(dataset),
            items: BTreeMap::new(),
        }
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn dataset(&self) -> Option<&Arc<TabularDataset>> {
        self.dataset.as_ref()
    }

    /// Dataset of the package; calling this without checking
    /// [`has_dataset`](Self::has_dataset) is a contract violation.
    pub fn require_dataset(&self) -> Result<&Arc<TabularDataset>> {
        self.dataset
            .as_ref()
            .ok_or_else(|| FlowError::invalid_state("subset package has no dataset"))
    }

    /// Content hash of the dataset, if any
    pub fn dataset_hash(&self) -> Option<&str> {
        self.dataset.as_deref().map(|d| d.hash())
    }

    pub fn items(&self) -> impl Iterator<Item = &SubsetItem> {
        self.items.values()
    }

    pub fn item(&self, index: usize) -> Option<&SubsetItem> {
        self.items.get(&index)
    }

    /// Included row indices in ascending order
    pub fn item_indices(&self) -> Vec<usize> {
        self.items.keys().copied().collect()
    }

    pub fn has_item(&self, index: usize) -> bool {
        self.items.contains_key(&index)
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Insert an item, or merge its visuals into the existing entry
    pub fn add_item(&mut self, item: SubsetItem) -> Result<()> {
        match &self.dataset {
            Some(dataset) if item.index < dataset.num_rows() => {}
            Some(dataset) => {
                return Err(FlowError::invalid_state(format!(
                    "row {} out of range for dataset with {} rows",
                    item.index,
                    dataset.num_rows()
                )))
            }
            None => return Err(FlowError::invalid_state("cannot add items to a subset without dataset")),
        }
        match self.items.get_mut(&item.index) {
            Some(existing) => existing.visuals.merge(&item.visuals),
            None => {
                self.items.insert(item.index, item);
            }
        }
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Option<SubsetItem> {
        self.items.remove(&index)
    }

    /// Remove every item failing the predicate
    pub fn filter_items<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&SubsetItem) -> bool,
    {
        self.items.retain(|_, item| predicate(item));
    }

    /// Clear the items; the dataset is kept
    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    /// Clear the dataset and, with it, every item
    pub fn clear_dataset(&mut self) {
        self.dataset = None;
        self.items.clear();
    }

    /// Copy restricted to `indices` that are present in this package
    pub fn subset(&self, indices: &[usize]) -> SubsetPackage {
        let items = indices
            .iter()
            .filter_map(|index| self.items.get(index).map(|item| (*index, item.clone())))
            .collect();
        SubsetPackage {
            dataset: self.dataset.clone(),
            items,
        }
    }

    /// Bucket items by their value in `column`, in first-seen group order.
    /// `None` yields a single group with every item.
    pub fn group_items(&self, column: Option<ColumnRef>) -> Vec<Vec<usize>> {
        let Some(column) = column else {
            return if self.items.is_empty() {
                Vec::new()
            } else {
                vec![self.item_indices()]
            };
        };
        let Some(dataset) = &self.dataset else {
            return Vec::new();
        };

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slots: HashMap<GroupKey, usize> = HashMap::new();
        for &index in self.items.keys() {
            let Some(value) = dataset.cell(index, column) else {
                continue;
            };
            let slot = *slots.entry(value.group_key()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(index);
        }
        groups
    }

    /// Whether two subset packages may meet at the same node
    pub fn is_compatible_with(&self, other: &SubsetPackage) -> bool {
        match (self.dataset_hash(), other.dataset_hash()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
