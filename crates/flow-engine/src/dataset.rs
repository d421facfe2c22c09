//! Tabular datasets shared by subset packages
//!
//! A dataset is immutable once built and is shared by `Arc` across every
//! package that references it. Nodes that need different rows or columns
//! build a new dataset instead of editing cells.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A single cell value
///
/// Non-finite numbers are written as `null` and read back as NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Cell {
            Number(f64),
            Text(String),
            Missing(()),
        }
        Ok(match Cell::deserialize(deserializer)? {
            Cell::Number(n) => CellValue::Number(n),
            Cell::Text(s) => CellValue::Text(s),
            Cell::Missing(()) => CellValue::Number(f64::NAN),
        })
    }
}

impl CellValue {
    /// Numeric view of the cell; numeric strings are parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Type-aware ordering: numbers before strings, numbers numerically,
    /// strings lexically.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Number(_), CellValue::Text(_)) => Ordering::Less,
            (CellValue::Text(_), CellValue::Number(_)) => Ordering::Greater,
        }
    }

    /// Hashable key used to bucket equal values
    pub fn group_key(&self) -> GroupKey {
        match self {
            // -0.0 and 0.0 land in the same bucket
            CellValue::Number(n) if *n == 0.0 => GroupKey::Number(0.0f64.to_bits()),
            CellValue::Number(n) => GroupKey::Number(n.to_bits()),
            CellValue::Text(s) => GroupKey::Text(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// Equality key for grouping cell values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Number(u64),
    Text(String),
}

/// Value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Float,
    String,
    Date,
}

impl ValueType {
    /// Whether the column holds numbers
    pub fn is_numerical(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

/// Reference to a column, including the row-index pseudo-column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRef {
    /// The row index itself
    Index,
    /// A real column by position
    Column(usize),
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularColumn {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub has_duplicate: bool,
}

/// One row of cells
pub type TabularRow = Vec<CellValue>;

#[derive(Serialize, Deserialize)]
struct DatasetSave {
    columns: Vec<TabularColumn>,
    rows: Vec<TabularRow>,
}

/// Immutable table with a content hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DatasetSave", into = "DatasetSave")]
pub struct TabularDataset {
    columns: Vec<TabularColumn>,
    rows: Vec<TabularRow>,
    hash: String,
}

impl PartialEq for TabularDataset {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl From<DatasetSave> for TabularDataset {
    fn from(save: DatasetSave) -> Self {
        TabularDataset::new(save.columns, save.rows)
    }
}

impl From<TabularDataset> for DatasetSave {
    fn from(dataset: TabularDataset) -> Self {
        DatasetSave {
            columns: dataset.columns,
            rows: dataset.rows,
        }
    }
}

/// Hash over column names and row contents
fn content_hash(columns: &[TabularColumn], rows: &[TabularRow]) -> String {
    let mut hasher = blake3::Hasher::new();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    hasher.update(names.join(",").as_bytes());
    for row in rows {
        for cell in row {
            hasher.update(b",");
            // Tag the variant so 1 and "1" hash differently
            match cell {
                CellValue::Number(n) => {
                    hasher.update(b"n");
                    hasher.update(n.to_string().as_bytes());
                }
                CellValue::Text(s) => {
                    hasher.update(b"s");
                    hasher.update(s.as_bytes());
                }
            }
        }
        hasher.update(b";");
    }
    hasher.finalize().to_hex().to_string()
}

fn infer_type(rows: &[TabularRow], column: usize) -> ValueType {
    let mut value_type = ValueType::Int;
    for row in rows {
        match row.get(column) {
            Some(CellValue::Text(_)) => return ValueType::String,
            Some(CellValue::Number(n)) if n.fract() != 0.0 => value_type = ValueType::Float,
            _ => {}
        }
    }
    value_type
}

fn has_duplicate(rows: &[TabularRow], column: usize) -> bool {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .any(|cell| !seen.insert(cell.group_key()))
}

impl TabularDataset {
    /// Build a dataset from explicit column metadata
    pub fn new(columns: Vec<TabularColumn>, rows: Vec<TabularRow>) -> Self {
        let hash = content_hash(&columns, &rows);
        Self {
            columns,
            rows,
            hash,
        }
    }

    /// Build a dataset from column names, inferring column types
    pub fn from_rows<S: Into<String>>(names: Vec<S>, rows: Vec<TabularRow>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| TabularColumn {
                index,
                name: name.into(),
                value_type: infer_type(&rows, index),
                has_duplicate: has_duplicate(&rows, index),
            })
            .collect();
        Self::new(columns, rows)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[TabularColumn] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&TabularColumn> {
        self.columns.get(index)
    }

    /// Content hash; equal content means equal hash regardless of identity
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether a column reference resolves in this dataset
    pub fn has_column(&self, column: ColumnRef) -> bool {
        match column {
            ColumnRef::Index => true,
            ColumnRef::Column(c) => c < self.columns.len(),
        }
    }

    /// Cell value at a row; the index pseudo-column yields the row index
    pub fn cell(&self, row: usize, column: ColumnRef) -> Option<CellValue> {
        match column {
            ColumnRef::Index => (row < self.rows.len()).then(|| CellValue::Number(row as f64)),
            ColumnRef::Column(c) => self.rows.get(row)?.get(c).cloned(),
        }
    }

    pub fn column_name(&self, column: ColumnRef) -> String {
        match column {
            ColumnRef::Index => "[index]".to_string(),
            ColumnRef::Column(c) => self
                .columns
                .get(c)
                .map(|col| col.name.clone())
                .unwrap_or_default(),
        }
    }

    pub fn column_type(&self, column: ColumnRef) -> Option<ValueType> {
        match column {
            ColumnRef::Index => Some(ValueType::Int),
            ColumnRef::Column(c) => self.columns.get(c).map(|col| col.value_type),
        }
    }

    /// Sorted values of a column over the given rows
    pub fn domain_values(&self, column: ColumnRef, items: &[usize], distinct: bool) -> Vec<CellValue> {
        let mut values: Vec<CellValue> = items
            .iter()
            .filter_map(|&row| self.cell(row, column))
            .collect();
        values.sort_by(|a, b| a.compare(b));
        if distinct {
            values.dedup_by(|a, b| a.group_key() == b.group_key());
        }
        values
    }
}
