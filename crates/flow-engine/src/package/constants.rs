//! Constants packages: ordered lists of scalar values

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::dataset::CellValue;

/// Kind of values a constants package carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantType {
    Empty,
    Number,
    String,
    Mixed,
}

/// Ordered list of number or string values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantsPackage {
    values: Vec<CellValue>,
}

fn parse_token(token: &str) -> CellValue {
    if let Ok(n) = token.parse::<i64>() {
        return CellValue::Number(n as f64);
    }
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(token.to_string()),
    }
}

impl ConstantsPackage {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    /// Parse a `,`/`;` separated list; numbers are inferred
    pub fn parse(text: &str) -> Self {
        let values = text
            .split([',', ';'])
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(parse_token)
            .collect();
        Self { values }
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&CellValue> {
        self.values.first()
    }

    pub fn append(&mut self, values: impl IntoIterator<Item = CellValue>) {
        self.values.extend(values);
    }

    /// Remove duplicates, keeping the first occurrence
    pub fn unique(&mut self) {
        let mut seen = HashSet::new();
        self.values.retain(|value| seen.insert(value.group_key()));
    }

    /// Numbers ascending, then strings ascending
    pub fn sort(&mut self) {
        self.values.sort_by(|a, b| a.compare(b));
    }

    pub fn constant_type(&self) -> ConstantType {
        let numbers = self.values.iter().filter(|v| matches!(v, CellValue::Number(_))).count();
        match (self.values.len(), numbers) {
            (0, _) => ConstantType::Empty,
            (len, n) if n == len => ConstantType::Number,
            (_, 0) => ConstantType::String,
            _ => ConstantType::Mixed,
        }
    }

    /// Number-only and string-only packages cannot meet at one port
    pub fn is_compatible_with(&self, other: &ConstantsPackage) -> bool {
        !matches!(
            (self.constant_type(), other.constant_type()),
            (ConstantType::Number, ConstantType::String) | (ConstantType::String, ConstantType::Number)
        )
    }
}
