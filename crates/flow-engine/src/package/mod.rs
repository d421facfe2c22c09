//! Packages carried by ports
//!
//! A package is the data payload on an output port. Input ports never own a
//! package; they read through their edges.

mod constants;
mod subset;

pub use constants::{ConstantType, ConstantsPackage};
pub use subset::{SubsetItem, SubsetPackage, VisualProperties};

use crate::types::PortDataType;

/// Data payload of a port
#[derive(Debug, Clone, PartialEq)]
pub enum Package {
    Subset(SubsetPackage),
    Constants(ConstantsPackage),
    Json(serde_json::Value),
}

impl Package {
    pub fn data_type(&self) -> PortDataType {
        match self {
            Package::Subset(_) => PortDataType::Subset,
            Package::Constants(_) => PortDataType::Constants,
            Package::Json(_) => PortDataType::Json,
        }
    }

    pub fn as_subset(&self) -> Option<&SubsetPackage> {
        match self {
            Package::Subset(pkg) => Some(pkg),
            _ => None,
        }
    }

    pub fn as_constants(&self) -> Option<&ConstantsPackage> {
        match self {
            Package::Constants(pkg) => Some(pkg),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Package::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Kind-specific compatibility between two packages of the same type
    pub fn is_compatible_with(&self, other: &Package) -> Result<(), String> {
        match (self, other) {
            (Package::Subset(a), Package::Subset(b)) => {
                if a.is_compatible_with(b) {
                    Ok(())
                } else {
                    Err("cannot mix subsets of different datasets".to_string())
                }
            }
            (Package::Constants(a), Package::Constants(b)) => {
                if a.is_compatible_with(b) {
                    Ok(())
                } else {
                    Err(format!(
                        "cannot mix {:?} constants with {:?} constants",
                        a.constant_type(),
                        b.constant_type()
                    ))
                }
            }
            (Package::Json(_), Package::Json(_)) => Ok(()),
            (a, b) => Err(format!("{} package cannot meet {} package", a.data_type(), b.data_type())),
        }
    }
}

impl From<SubsetPackage> for Package {
    fn from(pkg: SubsetPackage) -> Self {
        Package::Subset(pkg)
    }
}

impl From<ConstantsPackage> for Package {
    fn from(pkg: ConstantsPackage) -> Self {
        Package::Constants(pkg)
    }
}

impl From<serde_json::Value> for Package {
    fn from(value: serde_json::Value) -> Self {
        Package::Json(value)
    }
}
