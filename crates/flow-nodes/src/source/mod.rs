//! Source nodes
//!
//! Nodes that start propagation without upstream input.

mod constants_generator;
mod data_source;

pub use constants_generator::ConstantsGenerator;
pub use data_source::DataSource;
