//! Filter nodes
//!
//! Nodes that keep a subset of their input items.

mod range_filter;
mod sampler;
mod value_filter;

pub use range_filter::RangeFilter;
pub use sampler::Sampler;
pub use value_filter::{MatchMode, ValueFilter};
